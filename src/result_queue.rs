//! Hand-off of results from runner threads to the thread running the
//! event loop.
//!
//! Any number of [`ResultSender`]s push from any thread. The queue itself is
//! a `calloop` event source: once attached to an event loop, the handler
//! runs only inside that loop's `dispatch`, on the loop's thread, one
//! element at a time and in push order. The handler receives each element
//! by value and owns the result from then on.

use crate::model::SearchResult;
use crate::runner::RunnerId;
use calloop::channel::{Channel, Event, Sender};
use calloop::{LoopHandle, RegistrationToken};
use log::debug;

/// One result, tagged with who produced it and for which query.
///
/// A handler compares `query` with the text it last asked `origin` to run
/// to drop results that are no longer wanted.
#[derive(Debug)]
pub struct ResultEvent {
    pub origin: RunnerId,
    pub query: String,
    pub confidence: f32,
    pub result: SearchResult,
}

#[derive(Clone)]
pub struct ResultSender {
    tx: Sender<ResultEvent>,
}

impl ResultSender {
    /// Enqueues a result and wakes the consuming loop. Returns false if the
    /// queue is gone, in which case the result is dropped.
    pub fn push(&self, origin: RunnerId, query: &str, confidence: f32, result: SearchResult) -> bool {
        let event = ResultEvent {
            origin,
            query: query.to_string(),
            confidence,
            result,
        };
        match self.tx.send(event) {
            Ok(()) => true,
            Err(_) => {
                debug!("ResultQueue: consumer is gone, dropping result for '{}'", query);
                false
            }
        }
    }
}

/// Creates a queue and the first of its senders.
pub fn channel() -> (ResultSender, ResultQueue) {
    let (tx, channel) = calloop::channel::channel();
    (ResultSender { tx }, ResultQueue { channel })
}

/// Consuming end, inert until attached to an event loop.
pub struct ResultQueue {
    channel: Channel<ResultEvent>,
}

impl ResultQueue {
    /// Registers the queue on an event loop. `handler` is then called from
    /// that loop's thread for every pushed element.
    pub fn attach<'l, Data, F>(
        self,
        handle: &LoopHandle<'l, Data>,
        mut handler: F,
    ) -> Result<RegistrationToken, calloop::Error>
    where
        F: FnMut(ResultEvent, &mut Data) + 'l,
    {
        handle
            .insert_source(self.channel, move |event, _, data| match event {
                Event::Msg(element) => handler(element, data),
                Event::Closed => debug!("ResultQueue: all senders dropped"),
            })
            .map_err(|e| e.error)
    }
}
