//! Enumerated status and category values.
//!
//! Values are stored as their snake_case string in the database and travel
//! over the wire in the same form.

macro_rules! string_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $value:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $(#[serde(rename = $value)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $value),+
                }
            }

            pub fn parse(value: &str) -> Option<Self> {
                match value.trim() {
                    $($value => Some($name::$variant),)+
                    _ => None,
                }
            }

            /// Comma separated list of accepted values, for error messages.
            pub fn choices() -> String {
                [$($value),+].join(", ")
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

string_enum!(
    Role {
        Admin => "admin",
        Reviewer => "reviewer",
        Member => "member",
    }
);

string_enum!(
    AbstractStatus {
        Draft => "draft",
        Submitted => "submitted",
        UnderReview => "under_review",
        RevisionRequested => "revision_requested",
        Accepted => "accepted",
        Rejected => "rejected",
    }
);

impl AbstractStatus {
    /// Transitions an administrator may apply through the status-update action.
    pub fn can_transition_to(self, next: AbstractStatus) -> bool {
        use AbstractStatus::*;
        matches!(
            (self, next),
            (Submitted, UnderReview)
                | (Submitted, Accepted)
                | (Submitted, Rejected)
                | (UnderReview, Accepted)
                | (UnderReview, Rejected)
                | (UnderReview, RevisionRequested)
                | (RevisionRequested, UnderReview)
        )
    }

    /// States in which the submitter may still edit the abstract.
    pub fn is_editable(self) -> bool {
        matches!(self, AbstractStatus::Draft | AbstractStatus::RevisionRequested)
    }

    pub fn is_reviewable(self) -> bool {
        matches!(self, AbstractStatus::Submitted | AbstractStatus::UnderReview)
    }
}

string_enum!(
    AbstractCategory {
        Clinical => "clinical",
        Research => "research",
        CaseReport => "case_report",
        Review => "review",
        Other => "other",
    }
);

string_enum!(
    PresentationType {
        Oral => "oral",
        Poster => "poster",
    }
);

string_enum!(
    Recommendation {
        Accept => "accept",
        Reject => "reject",
        Revise => "revise",
    }
);

string_enum!(
    ConferenceStatus {
        Upcoming => "upcoming",
        Ongoing => "ongoing",
        Completed => "completed",
        Cancelled => "cancelled",
    }
);

string_enum!(
    RegistrationType {
        Member => "member",
        NonMember => "non_member",
        Student => "student",
    }
);

string_enum!(
    RegistrationStatus {
        Confirmed => "confirmed",
        Cancelled => "cancelled",
    }
);

string_enum!(
    PaymentStatus {
        Pending => "pending",
        Completed => "completed",
        Failed => "failed",
        Refunded => "refunded",
    }
);

string_enum!(
    ContactStatus {
        New => "new",
        Read => "read",
        Replied => "replied",
    }
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips_every_value() {
        for status in AbstractStatus::ALL {
            assert_eq!(AbstractStatus::parse(status.as_str()), Some(*status));
        }
        assert_eq!(AbstractStatus::parse("archived"), None);
    }

    #[test]
    fn abstract_workflow_transitions() {
        use AbstractStatus::*;
        assert!(Submitted.can_transition_to(UnderReview));
        assert!(UnderReview.can_transition_to(RevisionRequested));
        assert!(!Draft.can_transition_to(Accepted));
        assert!(!Accepted.can_transition_to(Rejected));
        assert!(!Rejected.can_transition_to(UnderReview));
    }

    #[test]
    fn serde_uses_snake_case_values() {
        let json = serde_json::to_string(&RegistrationType::NonMember).unwrap();
        assert_eq!(json, "\"non_member\"");
        assert_eq!(ContactStatus::choices(), "new, read, replied");
    }
}
