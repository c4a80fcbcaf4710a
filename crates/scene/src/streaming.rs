use worldlink_common::EntityId;

use crate::node::SceneNode;

/// Audio/video streaming service (external).
pub trait StreamingSubsystem {
    /// Join the streaming session with the token from the welcome message.
    fn connect(&mut self, token: &str);

    /// Start publishing local media; `video` adds the camera to the microphone.
    fn publish(&mut self, video: bool);

    /// Play the entity's incoming stream on `node`.
    fn stream_to_mesh(&mut self, entity: EntityId, node: &SceneNode);

    /// Drop the entity's subscription.
    fn remove_client(&mut self, entity: EntityId);
}
