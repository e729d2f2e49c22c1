//! Session data model and storage (§3, §4.1).

mod adversarial;
mod store;
mod ultraplan;

pub use adversarial::{
    AdversarialConfig, AdversarialPhase, AdversarialSession, IncrementFile, IncrementStatus,
    ReviewFile, Role, Round,
};
pub use store::{NullPersistence, PersistenceHook, SessionStore};
pub use ultraplan::{GroupDecision, Issue, Phase, RevisionState, Severity, UltraPlanSession};
