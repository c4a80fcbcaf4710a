use worldlink_common::SharedEntity;

use crate::node::SceneNode;
use crate::representation::{Capabilities, Representation, RepresentationKind};

/// Builds the representation for a video-stream entity. Receives the custom
/// per-representation options from configuration.
pub type VideoAvatarFactory =
    Box<dyn FnMut(&SharedEntity, Option<&serde_json::Value>) -> Box<dyn Representation>>;

/// Default video avatar: a flat display showing the remote user's stream, or
/// their name while no stream is attached.
#[derive(Debug)]
pub struct VideoAvatar {
    mesh: SceneNode,
    label: String,
    auto_start: bool,
    auto_attach: bool,
    visible: bool,
    options: Option<serde_json::Value>,
    capabilities: Capabilities,
    disposed: bool,
}

impl VideoAvatar {
    pub fn new(options: Option<serde_json::Value>) -> Self {
        Self {
            mesh: SceneNode::new("video"),
            label: String::new(),
            auto_start: true,
            auto_attach: true,
            visible: false,
            options,
            capabilities: Capabilities::new(),
            disposed: false,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn autoplay(&self) -> (bool, bool) {
        (self.auto_start, self.auto_attach)
    }

    pub fn options(&self) -> Option<&serde_json::Value> {
        self.options.as_ref()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}

/// Factory used when the host installs none.
pub fn default_video_avatar() -> VideoAvatarFactory {
    Box::new(
        |_entity: &SharedEntity, options: Option<&serde_json::Value>| -> Box<dyn Representation> {
            Box::new(VideoAvatar::new(options.cloned()))
        },
    )
}

impl Representation for VideoAvatar {
    fn kind(&self) -> RepresentationKind {
        RepresentationKind::VideoAvatar
    }

    fn root(&self) -> &SceneNode {
        &self.mesh
    }

    fn root_mut(&mut self) -> &mut SceneNode {
        &mut self.mesh
    }

    fn capabilities(&mut self) -> &mut Capabilities {
        &mut self.capabilities
    }

    fn set_label(&mut self, label: &str) {
        self.label = label.to_string();
    }

    fn set_autoplay(&mut self, auto_start: bool, auto_attach: bool) {
        self.auto_start = auto_start;
        self.auto_attach = auto_attach;
    }

    fn show(&mut self) {
        self.visible = true;
    }

    fn dispose(&mut self) {
        self.visible = false;
        self.disposed = true;
    }
}
