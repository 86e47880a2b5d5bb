// ── Poll/reconcile loop ──
//
// Periodically pulls live robot state and reconciles it against the
// registry of tracked accessories. Structural changes (add/remove)
// happen only in `sync_once`; the steady-state poll just refreshes
// characteristics on what is already tracked.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use whisker_api::{Robot, RobotClient};

use crate::config::BridgeConfig;
use crate::error::CoreError;
use crate::hub::{AccessoryHub, Characteristic, CharacteristicValue, SwitchKind};
use crate::projection::StatusProjection;

/// Counts of changes applied by one [`SyncController::sync_once`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncSummary {
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
}

struct Tracked<H: AccessoryHub> {
    record: Robot,
    handle: H::Handle,
}

/// Reconciles vendor state against host accessories.
///
/// Each tracked id moves Unknown → Tracked → Removed; Removed is
/// terminal, and an id that reappears later is treated as a brand-new
/// robot with a fresh handle. The registry is owned here and mutated
/// only through `sync_once` / `poll_tick`; the host reads derived
/// state through [`switch_state`](Self::switch_state), never by
/// reaching into the registry.
pub struct SyncController<H: AccessoryHub> {
    client: Arc<RobotClient>,
    hub: Arc<H>,
    registry: Mutex<HashMap<String, Tracked<H>>>,
}

impl<H: AccessoryHub> SyncController<H> {
    pub fn new(client: Arc<RobotClient>, hub: Arc<H>) -> Self {
        Self {
            client,
            hub,
            registry: Mutex::new(HashMap::new()),
        }
    }

    /// Build a client from `config` and wrap it in a controller.
    pub fn connect(config: &BridgeConfig, hub: Arc<H>) -> Result<Self, CoreError> {
        let client = RobotClient::new(config.client_config())?;
        Ok(Self::new(Arc::new(client), hub))
    }

    /// The underlying API client.
    pub fn client(&self) -> &Arc<RobotClient> {
        &self.client
    }

    /// Number of currently tracked robots.
    pub async fn tracked_count(&self) -> usize {
        self.registry.lock().await.len()
    }

    // ── Reconciliation ───────────────────────────────────────────────

    /// Structural sync: fetch fresh state and add, update, and remove
    /// registry entries to match. Run at startup and on demand.
    pub async fn sync_once(&self) -> Result<SyncSummary, CoreError> {
        let robots = self.client.list_robots(false).await?;
        let seen: HashSet<String> = robots.iter().map(|r| r.id.clone()).collect();

        let mut registry = self.registry.lock().await;
        let mut summary = SyncSummary::default();

        for robot in robots {
            if let Some(tracked) = registry.get_mut(&robot.id) {
                tracked.record = robot;
                self.push_update(&tracked.handle, &tracked.record);
                summary.updated += 1;
            } else {
                info!(id = %robot.id, nickname = %robot.nickname, "tracking new robot");
                let handle = self.hub.create_handle(&robot);
                self.hub.register_handle(&handle);
                self.push_update(&handle, &robot);
                registry.insert(robot.id.clone(), Tracked { record: robot, handle });
                summary.added += 1;
            }
        }

        let stale: Vec<String> = registry
            .keys()
            .filter(|id| !seen.contains(*id))
            .cloned()
            .collect();
        for id in stale {
            if let Some(tracked) = registry.remove(&id) {
                info!(%id, "releasing removed robot");
                self.hub.release_handle(tracked.handle);
                summary.removed += 1;
            }
        }

        debug!(?summary, "structural sync complete");
        Ok(summary)
    }

    /// Steady-state tick: fetch fresh state and refresh characteristics
    /// on tracked robots. Never adds or removes -- structural changes
    /// wait for [`sync_once`](Self::sync_once). Returns how many
    /// records were refreshed.
    pub async fn poll_tick(&self) -> Result<usize, CoreError> {
        let robots = self.client.list_robots(false).await?;

        let mut registry = self.registry.lock().await;
        let mut updated = 0;
        for robot in robots {
            if let Some(tracked) = registry.get_mut(&robot.id) {
                tracked.record = robot;
                self.push_update(&tracked.handle, &tracked.record);
                updated += 1;
            }
        }

        debug!(updated, "poll tick complete");
        Ok(updated)
    }

    /// Drive [`poll_tick`](Self::poll_tick) on `interval` until
    /// `cancel` fires. Individual tick failures are logged and
    /// survived; the loop itself never terminates on error.
    pub async fn run(&self, interval: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // consume the immediate first tick

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.poll_tick().await {
                        warn!(error = %e, "poll tick failed");
                    }
                }
            }
        }
        debug!("poll loop stopped");
    }

    fn push_update(&self, handle: &H::Handle, robot: &Robot) {
        let p = StatusProjection::project(robot);
        let hub = &self.hub;
        hub.notify_update(handle, Characteristic::Powered, CharacteristicValue::Bool(p.powered));
        hub.notify_update(
            handle,
            Characteristic::NightLight,
            CharacteristicValue::Bool(p.night_light),
        );
        hub.notify_update(
            handle,
            Characteristic::OccupancyDetected,
            CharacteristicValue::Bool(p.occupancy),
        );
        hub.notify_update(
            handle,
            Characteristic::StatusActive,
            CharacteristicValue::Bool(p.status_active),
        );
        hub.notify_update(
            handle,
            Characteristic::StatusFault,
            CharacteristicValue::Bool(p.status_fault),
        );
        hub.notify_update(
            handle,
            Characteristic::FilterLifeLevel,
            CharacteristicValue::Level(p.filter_life_level),
        );
        hub.notify_update(
            handle,
            Characteristic::FilterChangeIndication,
            CharacteristicValue::Bool(p.filter_change_needed),
        );
    }

    // ── Host entry points ────────────────────────────────────────────

    /// Host-invoked read of a switch characteristic. Served from the
    /// short-TTL cache; an unknown or unreachable robot reads as off.
    pub async fn switch_state(&self, id: &H::Id, kind: SwitchKind) -> Result<bool, CoreError> {
        let robots = self.client.list_robots(true).await?;
        Ok(robots
            .iter()
            .find(|r| self.hub.stable_id(&r.id) == *id)
            .is_some_and(|robot| {
                let p = StatusProjection::project(robot);
                match kind {
                    SwitchKind::Power => p.powered,
                    SwitchKind::NightLight => p.night_light,
                }
            }))
    }

    /// Host-invoked write of a switch characteristic.
    pub async fn set_switch(&self, id: &H::Id, kind: SwitchKind, on: bool) -> Result<(), CoreError> {
        let robot = self.resolve(id).await?;
        match kind {
            SwitchKind::Power => self.client.set_power(&robot.id, on).await?,
            SwitchKind::NightLight => self.client.set_night_light(&robot.id, on).await?,
        };
        Ok(())
    }

    /// Host-invoked clean-cycle trigger.
    pub async fn start_cleaning(&self, id: &H::Id) -> Result<(), CoreError> {
        let robot = self.resolve(id).await?;
        self.client.start_cleaning(&robot.id).await?;
        Ok(())
    }

    async fn resolve(&self, id: &H::Id) -> Result<Robot, CoreError> {
        let robots = self.client.list_robots(true).await?;
        robots
            .into_iter()
            .find(|r| self.hub.stable_id(&r.id) == *id)
            .ok_or_else(|| CoreError::RobotNotFound {
                identifier: format!("{id:?}"),
            })
    }
}
