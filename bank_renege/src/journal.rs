use std::fmt;

use des::Time;

/// A customer state transition worth reporting
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Label {
    Arrived,
    /// Reached the counter after waiting this long
    Waited(Time),
    /// Gave up after waiting this long
    Reneged(Time),
    Finished,
}

impl Label {
    /// Finished and Reneged end a customer's lifecycle
    pub fn is_terminal(&self) -> bool {
        matches!(self, Label::Finished | Label::Reneged(_))
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Arrived => write!(f, "Here I'm"),
            Label::Waited(wait) => write!(f, "Waited {:.3}", wait),
            Label::Reneged(wait) => write!(f, "RENEGED after {:.3}", wait),
            Label::Finished => write!(f, "Finished"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub time: Time,
    pub customer: String,
    pub label: Label,
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3} {}: {}", self.time, self.customer, self.label)
    }
}

/// Ordered log of everything the customers did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Journal {
    records: Vec<Record>,
}

impl Journal {
    pub fn new() -> Self {
        Journal::default()
    }

    pub fn push(&mut self, time: Time, customer: &str, label: Label) {
        self.records.push(Record {
            time,
            customer: customer.to_string(),
            label,
        });
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn terminal(&self) -> impl Iterator<Item = &Record> {
        self.records.iter().filter(|record| record.label.is_terminal())
    }

    pub fn lines(&self) -> impl Iterator<Item = String> + '_ {
        self.records.iter().map(|record| record.to_string())
    }
}
