//! Status helper enums mapping to SMALLINT lookup tables, plus the
//! generation state machine transition table.
//!
//! Each enum variant's discriminant matches the seed data order (1-based)
//! in the corresponding `*_statuses` database table.

/// Status ID type matching SMALLINT/SMALLSERIAL in the database.
pub type StatusId = i16;

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:expr ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $name {
            /// Return the database status ID.
            pub fn id(self) -> StatusId {
                self as StatusId
            }

            /// Map a database status ID back to the enum, if valid.
            pub fn from_id(id: StatusId) -> Option<Self> {
                match id {
                    $( $val => Some($name::$variant), )+
                    _ => None,
                }
            }
        }

        impl From<$name> for StatusId {
            fn from(value: $name) -> Self {
                value as StatusId
            }
        }
    };
}

define_status_enum! {
    /// Generation lifecycle status.
    GenerationStatus {
        /// Canonicalized and persisted, not yet dispatched.
        Created = 1,
        /// Accepted by a provider; a submission row exists.
        Submitted = 2,
        /// At least one status poll has returned "pending".
        Processing = 3,
        Completed = 4,
        Failed = 5,
        Cancelled = 6,
    }
}

define_status_enum! {
    /// Asset media type. Always written explicitly by the materializer from
    /// the adapter's declared media type — never inferred from the payload.
    MediaTypeId {
        Image = 1,
        Video = 2,
        Audio = 3,
        Model = 4,
    }
}

define_status_enum! {
    /// Post-creation moderation state of an asset. Owned by an external
    /// collaborator; the only field of an asset that mutates after insert.
    ModerationStatus {
        Pending = 1,
        Approved = 2,
        Removed = 3,
    }
}

impl GenerationStatus {
    /// Whether no further transition is permitted from this status.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            GenerationStatus::Completed | GenerationStatus::Failed | GenerationStatus::Cancelled
        )
    }

    /// The strict transition table for the generation state machine.
    ///
    /// Repositories enforce this with compare-and-swap updates; this
    /// function is the single in-process source of truth for what those
    /// CAS guards allow.
    pub fn can_transition(from: GenerationStatus, to: GenerationStatus) -> bool {
        use GenerationStatus::*;
        match (from, to) {
            (Created, Submitted) => true,
            // Transient dispatch failure: the record is requeued for another
            // attempt rather than a new row being created.
            (Submitted, Created) => true,
            (Submitted, Processing) => true,
            (Submitted | Processing, Completed) => true,
            (Created | Submitted | Processing, Failed) => true,
            (Created | Submitted | Processing, Cancelled) => true,
            _ => false,
        }
    }
}

impl From<fabula_core::operation::MediaType> for MediaTypeId {
    fn from(value: fabula_core::operation::MediaType) -> Self {
        use fabula_core::operation::MediaType;
        match value {
            MediaType::Image => MediaTypeId::Image,
            MediaType::Video => MediaTypeId::Video,
            MediaType::Audio => MediaTypeId::Audio,
            MediaType::Model => MediaTypeId::Model,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_status_ids_match_seed_data() {
        assert_eq!(GenerationStatus::Created.id(), 1);
        assert_eq!(GenerationStatus::Submitted.id(), 2);
        assert_eq!(GenerationStatus::Processing.id(), 3);
        assert_eq!(GenerationStatus::Completed.id(), 4);
        assert_eq!(GenerationStatus::Failed.id(), 5);
        assert_eq!(GenerationStatus::Cancelled.id(), 6);
    }

    #[test]
    fn media_type_ids_match_seed_data() {
        assert_eq!(MediaTypeId::Image.id(), 1);
        assert_eq!(MediaTypeId::Video.id(), 2);
        assert_eq!(MediaTypeId::Audio.id(), 3);
        assert_eq!(MediaTypeId::Model.id(), 4);
    }

    #[test]
    fn from_id_round_trips() {
        for status in [
            GenerationStatus::Created,
            GenerationStatus::Submitted,
            GenerationStatus::Processing,
            GenerationStatus::Completed,
            GenerationStatus::Failed,
            GenerationStatus::Cancelled,
        ] {
            assert_eq!(GenerationStatus::from_id(status.id()), Some(status));
        }
        assert_eq!(GenerationStatus::from_id(0), None);
        assert_eq!(GenerationStatus::from_id(7), None);
    }

    #[test]
    fn terminal_statuses() {
        assert!(!GenerationStatus::Created.is_terminal());
        assert!(!GenerationStatus::Submitted.is_terminal());
        assert!(!GenerationStatus::Processing.is_terminal());
        assert!(GenerationStatus::Completed.is_terminal());
        assert!(GenerationStatus::Failed.is_terminal());
        assert!(GenerationStatus::Cancelled.is_terminal());
    }

    #[test]
    fn forward_transitions_allowed() {
        use GenerationStatus::*;
        assert!(GenerationStatus::can_transition(Created, Submitted));
        assert!(GenerationStatus::can_transition(Submitted, Processing));
        assert!(GenerationStatus::can_transition(Submitted, Completed));
        assert!(GenerationStatus::can_transition(Processing, Completed));
        assert!(GenerationStatus::can_transition(Processing, Failed));
        assert!(GenerationStatus::can_transition(Created, Cancelled));
        assert!(GenerationStatus::can_transition(Processing, Cancelled));
    }

    #[test]
    fn no_transition_leaves_a_terminal_state() {
        use GenerationStatus::*;
        for from in [Completed, Failed, Cancelled] {
            for to in [Created, Submitted, Processing, Completed, Failed, Cancelled] {
                assert!(
                    !GenerationStatus::can_transition(from, to),
                    "{from:?} -> {to:?} must be rejected"
                );
            }
        }
    }

    #[test]
    fn cancelled_generation_never_completes() {
        assert!(!GenerationStatus::can_transition(
            GenerationStatus::Cancelled,
            GenerationStatus::Completed
        ));
    }

    #[test]
    fn backward_transitions_rejected_except_requeue() {
        use GenerationStatus::*;
        assert!(!GenerationStatus::can_transition(Processing, Submitted));
        assert!(!GenerationStatus::can_transition(Processing, Created));
        assert!(!GenerationStatus::can_transition(Created, Processing));
        // The one sanctioned backward edge: transient requeue.
        assert!(GenerationStatus::can_transition(Submitted, Created));
    }
}
