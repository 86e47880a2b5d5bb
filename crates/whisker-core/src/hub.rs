// ── Host collaborator seam ──
//
// The smart-home host owns accessory objects; the bridge only sees
// them through this trait. `Handle` stays opaque to the core -- it is
// created, registered, updated, and released, never inspected.

use uuid::Uuid;

use whisker_api::Robot;

/// Switches the host can read or flip through the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchKind {
    Power,
    NightLight,
}

/// Characteristics pushed to the host whenever a record updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Characteristic {
    Powered,
    NightLight,
    OccupancyDetected,
    StatusActive,
    StatusFault,
    FilterLifeLevel,
    FilterChangeIndication,
}

/// Values a characteristic update can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharacteristicValue {
    Bool(bool),
    Level(u8),
}

/// Host-side accessory lifecycle and update sink.
///
/// Implemented by the host adapter; invoked by
/// [`SyncController`](crate::sync::SyncController) on add, update, and
/// remove. Implementations may dispatch concurrently, so everything
/// here is `Send + Sync`.
pub trait AccessoryHub: Send + Sync {
    /// Opaque accessory object owned by the host.
    type Handle: Send + Sync;
    /// Stable comparable identity derived from a vendor device id.
    type Id: Eq + std::hash::Hash + Clone + std::fmt::Debug + Send + Sync;

    /// Derive the host's stable identity for a vendor device id. Must
    /// be deterministic: the same id maps to the same identity across
    /// restarts.
    fn stable_id(&self, robot_id: &str) -> Self::Id;

    /// Create an accessory handle for a newly tracked robot.
    fn create_handle(&self, robot: &Robot) -> Self::Handle;

    /// Register a freshly created handle with the host.
    fn register_handle(&self, handle: &Self::Handle);

    /// Release a handle whose robot disappeared from the account.
    fn release_handle(&self, handle: Self::Handle);

    /// Push one derived characteristic value to the host.
    fn notify_update(
        &self,
        handle: &Self::Handle,
        characteristic: Characteristic,
        value: CharacteristicValue,
    );
}

/// Deterministic UUID for a vendor device id, for hosts whose stable
/// identities are UUIDs.
pub fn stable_uuid(robot_id: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, robot_id.as_bytes())
}
