// shared-types-rs/src/lib.rs
// Domain types shared by the classifier, the audit log and the gateway

pub mod audit;
pub mod ticket;
pub mod wire;

pub use audit::{AuditDraft, AuditEntry, ChangeKind};
pub use ticket::{
    Assignee, ClassificationOrigin, ClassificationResult, ParseEnumError, Priority, Ticket,
    TicketStatus, EXPLANATION_MAX_CHARS,
};
pub use wire::{falsy_as_default, falsy_as_none};
