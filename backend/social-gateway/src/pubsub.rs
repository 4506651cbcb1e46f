//! In-process publish/subscribe for post events
//!
//! One broadcast channel per topic. A subscription only sees events published
//! after it subscribed; dropping the stream unsubscribes. Subscribers that fall
//! more than `capacity` events behind skip the missed events.

use std::collections::HashMap;
use std::fmt;

use futures::Stream;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::{debug, warn};

use crate::models::Post;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    PostCreated,
    PostUpdated,
    PostDeleted,
}

impl Topic {
    pub const ALL: [Topic; 3] = [Topic::PostCreated, Topic::PostUpdated, Topic::PostDeleted];

    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::PostCreated => "POST_CREATED",
            Topic::PostUpdated => "POST_UPDATED",
            Topic::PostDeleted => "POST_DELETED",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct PubSub {
    channels: HashMap<Topic, broadcast::Sender<Post>>,
}

impl PubSub {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let channels = Topic::ALL
            .into_iter()
            .map(|topic| (topic, broadcast::channel(capacity).0))
            .collect();

        Self { channels }
    }

    fn sender(&self, topic: Topic) -> &broadcast::Sender<Post> {
        // Every topic gets a channel in `new`.
        &self.channels[&topic]
    }

    /// Deliver `post` to current subscribers of `topic`; no-op when there are none
    pub fn publish(&self, topic: Topic, post: Post) {
        match self.sender(topic).send(post) {
            Ok(receivers) => debug!(topic = %topic, receivers, "Published post event"),
            Err(_) => debug!(topic = %topic, "No subscribers for post event"),
        }
    }

    pub fn subscribe(&self, topic: Topic) -> impl Stream<Item = Post> + Send + 'static {
        BroadcastStream::new(self.sender(topic).subscribe()).filter_map(move |event| match event {
            Ok(post) => Some(post),
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                warn!(topic = %topic, skipped, "Subscriber lagged, events dropped");
                None
            }
        })
    }

    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.sender(topic).receiver_count()
    }
}

impl Default for PubSub {
    fn default() -> Self {
        Self::new(256)
    }
}
