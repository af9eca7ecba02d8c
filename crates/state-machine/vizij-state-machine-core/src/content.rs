//! Animation content lookup used when a state is entered.

use std::sync::Arc;

use hashbrown::HashMap;

use crate::definition::StateMachineDefinition;
use crate::ids::ContentId;

/// What the content manager knows about one piece of animation content.
#[derive(Clone, Debug, PartialEq)]
pub struct AnimationAsset {
    pub has_state_machine_definition: bool,
    pub is_state_machine: bool,
    /// Duration of a single clip in seconds; negative when not applicable.
    pub single_animation_duration: f32,
    pub definition: Option<Arc<StateMachineDefinition>>,
}

impl AnimationAsset {
    pub fn clip(duration: f32) -> Self {
        Self {
            has_state_machine_definition: false,
            is_state_machine: false,
            single_animation_duration: duration,
            definition: None,
        }
    }

    pub fn state_machine(definition: Arc<StateMachineDefinition>) -> Self {
        Self {
            has_state_machine_definition: true,
            is_state_machine: true,
            single_animation_duration: -1.0,
            definition: Some(definition),
        }
    }
}

/// Resolves content ids referenced by state definitions.
pub trait ContentResolver {
    fn try_get_animation_asset(&self, id: ContentId) -> Option<AnimationAsset>;
}

impl<T: ContentResolver + ?Sized> ContentResolver for &T {
    fn try_get_animation_asset(&self, id: ContentId) -> Option<AnimationAsset> {
        (**self).try_get_animation_asset(id)
    }
}

/// Minimal in-memory content manager.
#[derive(Clone, Debug, Default)]
pub struct ContentLibrary {
    items: HashMap<ContentId, AnimationAsset>,
}

impl ContentLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: ContentId, asset: AnimationAsset) {
        self.items.insert(id, asset);
    }

    pub fn insert_clip(&mut self, id: ContentId, duration: f32) {
        self.insert(id, AnimationAsset::clip(duration));
    }

    pub fn insert_state_machine(&mut self, id: ContentId, definition: Arc<StateMachineDefinition>) {
        self.insert(id, AnimationAsset::state_machine(definition));
    }

    pub fn remove(&mut self, id: ContentId) -> Option<AnimationAsset> {
        self.items.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl ContentResolver for ContentLibrary {
    fn try_get_animation_asset(&self, id: ContentId) -> Option<AnimationAsset> {
        self.items.get(&id).cloned()
    }
}
