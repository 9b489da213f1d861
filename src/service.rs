//! The engine loop.
//!
//! One task owns the facade. Timer expiry, UI commands and the periodic
//! wall-clock checkpoint are all handled here in arrival order, so no
//! handler ever runs while another is mid-mutation.

use crate::facade::NotificationFacade;
use crate::protocol::{Command, Inbound};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

/// Apply one UI command. Failures are already reported by the facade.
pub fn dispatch(facade: &mut NotificationFacade, command: Command) {
    debug!(?command, "Dispatching command");
    let result = match command {
        Command::AddReminder { message, time } => facade.add(&message, &time).map(drop),
        Command::RepeatReminder { id, time } => facade.repeat(id, &time).map(drop),
        Command::DeleteItem { id } => facade.delete(id).map(drop),
        Command::StartWatching => facade.start_watching(),
        Command::StopWatching => {
            facade.stop_watching();
            Ok(())
        }
        Command::Resume => facade.resume(),
        Command::SetDarkMode { on } => facade.set_dark_mode(on),
        Command::SetLaunchAtStart { on } => facade.set_launch_at_start(on),
        Command::Shutdown => Ok(()),
    };
    if let Err(e) = result {
        debug!(error = %e, "Command failed");
    }
}

/// Run until the command channel closes or `SHUTDOWN` arrives.
///
/// The sleep is rebuilt from the scheduler state on every iteration, so a
/// re-arm always replaces the previous timer. While watching, a checkpoint
/// tick re-runs the watch decision in case the host slept through the timer.
pub async fn run_engine(
    mut facade: NotificationFacade,
    mut commands: mpsc::Receiver<Inbound>,
    checkpoint_interval: Duration,
) -> NotificationFacade {
    let mut checkpoint = tokio::time::interval(checkpoint_interval);
    checkpoint.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick completes immediately
    checkpoint.tick().await;

    info!(
        checkpoint_secs = checkpoint_interval.as_secs(),
        "Engine loop started"
    );

    loop {
        let timer = expiration_timer(facade.time_until_fire());

        tokio::select! {
            biased;

            _ = timer => {
                if let Err(e) = facade.on_timer_fired() {
                    error!(error = %e, "Expiration failed");
                }
            }

            command = commands.recv() => match command {
                None => {
                    info!("Command channel closed");
                    break;
                }
                Some(Inbound::Command(Command::Shutdown)) => {
                    info!("Shutdown requested");
                    break;
                }
                Some(Inbound::Command(command)) => dispatch(&mut facade, command),
                Some(Inbound::Rejected(event)) => facade.reject(event),
            },

            _ = checkpoint.tick() => {
                if facade.is_watching() {
                    if let Err(e) = facade.start_watching() {
                        error!(error = %e, "Checkpoint failed");
                    }
                }
            }
        }
    }

    facade.stop_watching();
    info!("Engine loop stopped");
    facade
}

async fn expiration_timer(delay: Option<Duration>) {
    match delay {
        Some(delay) => tokio::time::sleep(delay).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Clock;
    use crate::error::AppError;
    use crate::protocol::UiEvent;
    use crate::reminder::{Reminder, Selector};
    use crate::storage::MemoryStore;
    use chrono::{DateTime, Local, TimeZone};
    use std::sync::{Arc, Mutex};
    use tokio::sync::mpsc::error::TryRecvError;
    use tokio::time::Instant;

    /// Wall clock driven by tokio's (paused) clock, plus jumps that the
    /// monotonic clock never sees, like a host suspend.
    struct TokioClock {
        base: DateTime<Local>,
        start: Instant,
        jumped: Mutex<chrono::Duration>,
    }

    impl TokioClock {
        fn new(base: DateTime<Local>) -> Self {
            Self {
                base,
                start: Instant::now(),
                jumped: Mutex::new(chrono::Duration::zero()),
            }
        }

        fn jump(&self, by: chrono::Duration) {
            *self.jumped.lock().unwrap() += by;
        }
    }

    impl Clock for TokioClock {
        fn now(&self) -> DateTime<Local> {
            let elapsed = chrono::Duration::from_std(self.start.elapsed()).unwrap();
            self.base + elapsed + *self.jumped.lock().unwrap()
        }
    }

    struct Engine {
        commands: mpsc::Sender<Inbound>,
        events: mpsc::UnboundedReceiver<UiEvent>,
        clock: Arc<TokioClock>,
        handle: tokio::task::JoinHandle<NotificationFacade>,
    }

    async fn start_engine() -> Engine {
        let clock = Arc::new(TokioClock::new(
            Local.with_ymd_and_hms(2024, 6, 12, 16, 0, 0).unwrap(),
        ));
        let (event_tx, mut events) = mpsc::unbounded_channel();
        let mut facade = NotificationFacade::new(Arc::new(MemoryStore::new()), clock.clone(), event_tx);
        facade.initialize().unwrap();
        assert!(matches!(
            events.recv().await,
            Some(UiEvent::RemindersChanged { .. })
        ));

        let (commands, command_rx) = mpsc::channel(8);
        let handle = tokio::spawn(run_engine(facade, command_rx, Duration::from_secs(30)));
        Engine {
            commands,
            events,
            clock,
            handle,
        }
    }

    async fn next_list(events: &mut mpsc::UnboundedReceiver<UiEvent>) -> Vec<Reminder> {
        match events.recv().await {
            Some(UiEvent::RemindersChanged { reminders, .. }) => reminders,
            other => panic!("expected REMINDERS_CHANGED, got {:?}", other),
        }
    }

    impl Engine {
        async fn send(&self, item: impl Into<Inbound>) {
            self.commands.send(item.into()).await.unwrap();
        }
    }

    fn add(message: &str, time: &str) -> Command {
        Command::AddReminder {
            message: message.into(),
            time: time.into(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_expires_reminder() {
        let mut engine = start_engine().await;
        let started = Instant::now();

        engine.send(add("stretch", "1h")).await;
        let list = next_list(&mut engine.events).await;
        assert!(!list[0].is_expired);

        let list = next_list(&mut engine.events).await;
        assert!(list[0].is_expired);
        assert!(started.elapsed() >= Duration::from_secs(3600));

        engine.send(Command::Shutdown).await;
        let facade = engine.handle.await.unwrap();
        assert!(!facade.is_watching());
    }

    #[tokio::test(start_paused = true)]
    async fn test_checkpoint_catches_missed_timer() {
        let mut engine = start_engine().await;
        let started = Instant::now();

        engine.send(add("stretch", "1h")).await;
        next_list(&mut engine.events).await;

        // Host suspended for two hours: wall clock moved, tokio's did not
        engine.clock.jump(chrono::Duration::hours(2));
        let list = next_list(&mut engine.events).await;
        assert!(list[0].is_expired);
        assert!(started.elapsed() <= Duration::from_secs(30));

        drop(engine.commands);
        engine.handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_watching_until_resume() {
        let mut engine = start_engine().await;

        engine.send(add("stretch", "1m")).await;
        next_list(&mut engine.events).await;
        engine.send(Command::StopWatching).await;

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert!(matches!(engine.events.try_recv(), Err(TryRecvError::Empty)));

        engine.send(Command::Resume).await;
        let list = next_list(&mut engine.events).await;
        assert!(list[0].is_expired);

        drop(engine.commands);
        engine.handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_commands_apply_in_order() {
        let mut engine = start_engine().await;

        engine.send(add("", "1h")).await;
        engine.send(add("a", "1h")).await;
        engine.send(Command::DeleteItem { id: Selector::All }).await;
        engine
            .send(Command::RepeatReminder {
                id: Selector::Position(0),
                time: "2h".into(),
            })
            .await;

        assert!(matches!(engine.events.recv().await, Some(UiEvent::AddFailed { .. })));
        assert_eq!(next_list(&mut engine.events).await.len(), 1);
        assert!(next_list(&mut engine.events).await.is_empty());
        assert!(matches!(engine.events.recv().await, Some(UiEvent::RepeatFailed { .. })));

        engine.send(Command::SetDarkMode { on: true }).await;
        engine.send(Command::Shutdown).await;
        let facade = engine.handle.await.unwrap();
        assert!(facade.settings().dark_mode_on);
        assert!(facade.snapshot().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_line_keeps_its_place_in_the_queue() {
        let mut engine = start_engine().await;
        let rejected = UiEvent::AddFailed {
            reason: AppError::validation("malformed command"),
        };

        engine.send(add("a", "1h")).await;
        engine.send(Inbound::Rejected(rejected.clone())).await;
        engine.send(add("b", "2h")).await;

        assert_eq!(next_list(&mut engine.events).await.len(), 1);
        assert_eq!(engine.events.recv().await, Some(rejected));
        assert_eq!(next_list(&mut engine.events).await.len(), 2);

        drop(engine.commands);
        let facade = engine.handle.await.unwrap();
        assert_eq!(facade.snapshot().len(), 2);
    }
}
