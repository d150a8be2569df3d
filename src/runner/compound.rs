use super::QueryRunner;
use log::debug;

/// Drives several runners as one, typically one runner per data source.
///
/// Every call is forwarded to each child in order. Children deliver on
/// their own schedule, so results from different children interleave.
#[derive(Default)]
pub struct CompoundRunner {
    children: Vec<Box<dyn QueryRunner>>,
}

impl CompoundRunner {
    pub fn new(children: Vec<Box<dyn QueryRunner>>) -> Self {
        Self { children }
    }

    pub fn push(&mut self, child: Box<dyn QueryRunner>) {
        self.children.push(child);
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

impl QueryRunner for CompoundRunner {
    fn start(&mut self) {
        for child in &mut self.children {
            child.start();
        }
    }

    fn set_query(&mut self, query: &str) {
        debug!("CompoundRunner: query '{}' to {} runners", query, self.children.len());
        for child in &mut self.children {
            child.set_query(query);
        }
    }

    fn consolidate(&mut self) {
        for child in &mut self.children {
            child.consolidate();
        }
    }

    fn stop(&mut self) {
        for child in &mut self.children {
            child.stop();
        }
    }

    fn release(&mut self) {
        for child in &mut self.children {
            child.release();
        }
        self.children.clear();
    }
}
