use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::detector::FailureDetector;
use super::messages::{self, GossipMessage};
use crate::error::{GossipError, Result};
use crate::membership::{now_millis, GossipListener, Member, MemberState, MembershipStore};
use crate::settings::Settings;
use crate::transport::{Inbound, Transport};
use crate::{concurrency_error, config_error};

struct ControllerTasks {
    shutdown_tx: watch::Sender<bool>,
    scheduler: JoinHandle<()>,
    dispatcher: JoinHandle<()>,
}

/// One gossip participant: owns the membership store, runs a round every
/// gossip interval and answers peers' SYNC/ACK/ACK2/SHUTDOWN messages.
pub struct GossipController {
    pub(super) settings: Settings,
    pub(super) store: MembershipStore,
    pub(super) detector: FailureDetector,
    pub(super) transport: Arc<dyn Transport>,
    started: AtomicBool,
    working: AtomicBool,
    tasks: Mutex<Option<ControllerTasks>>,
}

impl std::fmt::Debug for GossipController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GossipController")
            .field("local", self.store.local())
            .field("cluster", &self.settings.cluster)
            .field("gossip_interval_ms", &self.settings.gossip_interval_ms)
            .field("seeds", &self.settings.seed_members)
            .field("working", &self.is_working())
            .finish()
    }
}

impl GossipController {
    /// Register the local member (JOIN) without touching the network yet
    pub fn new(
        settings: Settings,
        transport: Arc<dyn Transport>,
        listener: Option<Arc<dyn GossipListener>>,
    ) -> Result<Self> {
        settings.validate()?;
        let local = Member::new(
            settings.cluster.clone(),
            settings.gossip_addr(),
            settings.member_id(),
        );
        info!(
            "Created GossipController for {} in cluster '{}' with {} seeds",
            local,
            settings.cluster,
            settings.seed_members.len()
        );

        Ok(Self {
            detector: FailureDetector::from_settings(&settings),
            store: MembershipStore::new(local, now_millis(), listener),
            settings,
            transport,
            started: AtomicBool::new(false),
            working: AtomicBool::new(false),
            tasks: Mutex::new(None),
        })
    }

    pub fn local_member(&self) -> &Member {
        self.store.local()
    }

    pub fn cluster(&self) -> &str {
        &self.settings.cluster
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &MembershipStore {
        &self.store
    }

    pub fn detector(&self) -> &FailureDetector {
        &self.detector
    }

    pub fn is_working(&self) -> bool {
        self.working.load(Ordering::SeqCst)
    }

    pub fn live_members(&self) -> Result<Vec<Member>> {
        self.store.live_members()
    }

    pub fn dead_members(&self) -> Result<Vec<Member>> {
        self.store.dead_members()
    }

    pub fn convergence_count(&self) -> u32 {
        FailureDetector::convergence_count(self.store.endpoint_count())
    }

    pub fn convicted_time(&self) -> i64 {
        self.detector.convicted_time(self.store.endpoint_count())
    }

    /// Encode a message from this member
    pub(super) fn encode(&self, message: &GossipMessage) -> Result<bytes::Bytes> {
        messages::encode(message, self.cluster(), self.settings.gossip_addr())
    }

    /// Fire-and-forget send; failures are logged and reported as `false`
    pub(super) async fn send_to(&self, target: SocketAddr, data: &[u8]) -> bool {
        match self.transport.send_message(target, data).await {
            Ok(()) => true,
            Err(e) => {
                warn!("[{}] Failed to send to {}: {}", self.local_member(), target, e);
                false
            }
        }
    }

    /// Listen on the gossip address and spawn the round scheduler and the
    /// inbound dispatcher. A controller starts at most once.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        if self
            .started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(GossipError::Scheduler("controller was already started".to_string()).into());
        }
        let local = self.local_member();
        info!(
            "Starting gossip! cluster {} ip {} port {} id {}",
            local.cluster(),
            local.ip(),
            local.port(),
            local.id()
        );

        let inbound = match self.transport.listen(self.settings.gossip_addr()).await {
            Ok(inbound) => inbound,
            Err(e) => {
                self.started.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };
        self.working.store(true, Ordering::SeqCst);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let scheduler = tokio::spawn(self.clone().run_scheduler(shutdown_rx.clone()));
        let dispatcher = tokio::spawn(self.clone().run_dispatcher(inbound, shutdown_rx));

        let mut tasks = self
            .tasks
            .lock()
            .map_err(|e| concurrency_error!("Controller task lock poisoned: {}", e))?;
        *tasks = Some(ControllerTasks {
            shutdown_tx,
            scheduler,
            dispatcher,
        });
        Ok(())
    }

    async fn run_scheduler(self: Arc<Self>, mut shutdown_rx: watch::Receiver<bool>) {
        let period = self.settings.gossip_interval();
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut gossip_round = 0u64;
        debug!(
            "[{}] Gossip scheduler started with {}ms interval",
            self.local_member(),
            period.as_millis()
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => {
                    debug!("[{}] Gossip scheduler stopping after {} rounds", self.local_member(), gossip_round);
                    break;
                }
                _ = ticker.tick() => {
                    gossip_round += 1;
                    if let Err(e) = self.run_round().await {
                        warn!("[{}] Error during gossip round {}: {}", self.local_member(), gossip_round, e);
                    }
                }
            }
        }
    }

    async fn run_dispatcher(self: Arc<Self>, mut inbound: Inbound, mut shutdown_rx: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => break,
                received = inbound.recv() => {
                    let Some((data, source)) = received else {
                        info!("[{}] Inbound channel closed, exiting", self.local_member());
                        break;
                    };
                    if let Err(e) = self.handle_packet(&data, source).await {
                        debug!("[{}] Error processing packet from {}: {}", self.local_member(), source, e);
                    }
                }
            }
        }
    }

    /// Stop rounds, let in-flight work settle for one interval, then tell
    /// every live member we are leaving.
    pub async fn shutdown(&self) -> Result<()> {
        let tasks = self
            .tasks
            .lock()
            .map_err(|e| concurrency_error!("Controller task lock poisoned: {}", e))?
            .take();
        let tasks = match tasks {
            Some(tasks) => tasks,
            None => {
                debug!("[{}] Shutdown requested but controller is not running", self.local_member());
                return Ok(());
            }
        };
        info!("[{}] Shutting down gossip", self.local_member());

        // receivers only fail once both tasks are gone
        let _ = tasks.shutdown_tx.send(true);
        tasks
            .scheduler
            .await
            .map_err(|e| GossipError::Shutdown(format!("gossip scheduler failed: {}", e)))?;
        self.transport.unlisten().await?;
        tasks
            .dispatcher
            .await
            .map_err(|e| GossipError::Shutdown(format!("inbound dispatcher failed: {}", e)))?;

        time::sleep(self.settings.gossip_interval()).await;

        let sent = self.broadcast_shutdown().await?;
        self.working.store(false, Ordering::SeqCst);
        info!(
            "[{}] Gossip stopped, SHUTDOWN sent to {} live members",
            self.local_member(),
            sent
        );
        Ok(())
    }

    async fn broadcast_shutdown(&self) -> Result<usize> {
        let data = self.encode(&GossipMessage::Shutdown(self.local_member().clone()))?;
        let mut sent = 0;
        for member in self.store.live_members()? {
            if self.store.is_local(&member) {
                continue;
            }
            if self.send_to(member.socket_addr(), &data).await {
                sent += 1;
            }
        }
        Ok(sent)
    }

    /// Liveness state the local store holds for `member`
    pub fn member_state(&self, member: &Member) -> Result<Option<MemberState>> {
        self.store.state(member)
    }
}

/// Build a controller from settings alone, failing fast on bad values
pub fn controller_for(
    settings: Settings,
    transport: Arc<dyn Transport>,
    listener: Option<Arc<dyn GossipListener>>,
) -> Result<Arc<GossipController>> {
    if settings.seed_members.iter().any(|seed| seed.port() == 0) {
        return Err(config_error!("seed members need an explicit port"));
    }
    Ok(Arc::new(GossipController::new(settings, transport, listener)?))
}
