// Copyright 2025 the Aster Engine contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use log;

/// A stable identifier handed out by [`EventDispatcher::subscribe`], used to
/// unregister the subscriber later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberTag(u64);

/// Broadcasts events of type `T` to any number of registered subscribers.
///
/// Each subscriber owns the receiving half of an unbounded `flume` channel;
/// publishing clones the event into every live channel. Subscribers whose
/// receiver has been dropped are pruned on the next publish.
///
/// # Examples
///
/// ```
/// # use aster_core::event::EventDispatcher;
/// let mut dispatcher = EventDispatcher::<u32>::new();
/// let (tag, events) = dispatcher.subscribe();
///
/// dispatcher.publish(&7);
/// assert_eq!(events.try_recv(), Ok(7));
///
/// dispatcher.unsubscribe(tag);
/// dispatcher.publish(&8);
/// assert!(events.try_recv().is_err());
/// ```
#[derive(Debug)]
pub struct EventDispatcher<T: Clone> {
    subscribers: Vec<(SubscriberTag, flume::Sender<T>)>,
    next_tag: u64,
}

impl<T: Clone> EventDispatcher<T> {
    /// Creates a dispatcher with no subscribers.
    pub fn new() -> Self {
        Self {
            subscribers: Vec::new(),
            next_tag: 0,
        }
    }

    /// Registers a new subscriber and returns its tag together with the
    /// receiving end of its channel.
    pub fn subscribe(&mut self) -> (SubscriberTag, flume::Receiver<T>) {
        let tag = SubscriberTag(self.next_tag);
        self.next_tag += 1;

        let (sender, receiver) = flume::unbounded();
        self.subscribers.push((tag, sender));
        log::trace!(
            "Subscriber {tag:?} registered for {}.",
            std::any::type_name::<T>()
        );
        (tag, receiver)
    }

    /// Removes a subscriber. Unknown tags are a no-op.
    pub fn unsubscribe(&mut self, tag: SubscriberTag) {
        let before = self.subscribers.len();
        self.subscribers.retain(|(t, _)| *t != tag);
        if self.subscribers.len() == before {
            log::trace!("Unsubscribe for unknown tag {tag:?} ignored.");
        }
    }

    /// Publishes an event to every live subscriber.
    ///
    /// Subscribers whose receiver has disconnected are dropped from the
    /// registry.
    pub fn publish(&mut self, event: &T) {
        self.subscribers.retain(|(tag, sender)| {
            if sender.send(event.clone()).is_err() {
                log::trace!("Subscriber {tag:?} disconnected; pruning.");
                false
            } else {
                true
            }
        });
    }

    /// Returns the number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl<T: Clone> Default for EventDispatcher<T> {
    fn default() -> Self {
        Self::new()
    }
}

// --- Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    enum TestEvent {
        Ping,
        Value(u32),
    }

    #[test]
    fn events_reach_every_subscriber() {
        let mut dispatcher = EventDispatcher::new();
        let (_tag_a, rx_a) = dispatcher.subscribe();
        let (_tag_b, rx_b) = dispatcher.subscribe();

        dispatcher.publish(&TestEvent::Value(3));

        assert_eq!(rx_a.try_recv(), Ok(TestEvent::Value(3)));
        assert_eq!(rx_b.try_recv(), Ok(TestEvent::Value(3)));
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let mut dispatcher = EventDispatcher::new();
        let (tag, rx) = dispatcher.subscribe();

        dispatcher.unsubscribe(tag);
        dispatcher.publish(&TestEvent::Ping);
        assert!(rx.try_recv().is_err());
        assert_eq!(dispatcher.subscriber_count(), 0);

        // Unknown tag is a no-op.
        dispatcher.unsubscribe(tag);
    }

    #[test]
    fn dropped_receivers_are_pruned() {
        let mut dispatcher = EventDispatcher::new();
        let (_tag, rx) = dispatcher.subscribe();
        drop(rx);

        dispatcher.publish(&TestEvent::Ping);
        assert_eq!(dispatcher.subscriber_count(), 0);
    }

    #[test]
    fn events_queue_until_read() {
        let mut dispatcher = EventDispatcher::new();
        let (_tag, rx) = dispatcher.subscribe();

        dispatcher.publish(&TestEvent::Value(1));
        dispatcher.publish(&TestEvent::Value(2));

        assert_eq!(rx.try_recv(), Ok(TestEvent::Value(1)));
        assert_eq!(rx.try_recv(), Ok(TestEvent::Value(2)));
        assert!(rx.try_recv().is_err());
    }
}
