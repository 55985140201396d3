pub mod journey;
pub mod media;
pub mod user;

pub use journey::{Checkpoint, Journey, JourneyStatus, NewCheckpoint, NewJourney};
pub use media::{Media, MediaKind, NewMedia};
pub use user::User;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);

        impl $name {
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

entity_id!(
    /// Numeric user identity supplied by the auth collaborator.
    UserId
);
entity_id!(JourneyId);
entity_id!(CheckpointId);
entity_id!(MediaId);

impl UserId {
    /// Stands in for an unauthenticated requester. Stored ids start at 1, so
    /// this never matches a real owner.
    pub const ANONYMOUS: Self = Self(0);
}
