//! The command contract.

use serde::Serialize;
use serde::de::DeserializeOwned;

use stratum_core::WorkspaceName;

/// A command: an immutable, named, serializable intent.
///
/// Commands target a workspace and are transformed into events by a handler
/// (or rejected with a constraint violation). They are created once and
/// never mutated; `copy_for_workspace` returns an equivalent command aimed
/// at a different workspace, which is how rebase and partial publish replay
/// a workspace's commands against another base.
///
/// Serde gives the wire form: `Serialize` is the serializable map
/// representation, `DeserializeOwned` reconstructs a command from it.
pub trait Command:
    Clone + core::fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// The workspace this command targets.
    fn workspace_name(&self) -> &WorkspaceName;

    /// A pure rewrite of this command onto a different workspace.
    fn copy_for_workspace(&self, target: &WorkspaceName) -> Self;
}
