//! Host event dispatcher.
//!
//! The host integration pushes [`HostEvent`]s into an `mpsc` channel and
//! [`run`] applies them to the hub one at a time. Serial delivery keeps
//! per-device notifications ordered without extra locking.
//!
//! The loop ends when the channel closes, a [`HostEvent::Shutdown`] arrives
//! or the cancellation token fires. Every entry is unloaded on exit.

use time::OffsetDateTime;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use battery_notes_core::{EntryConfig, Options, RegistryEvent};

use crate::hub::BatteryNotes;

/// Events delivered from the host to the hub.
#[derive(Debug, Clone)]
pub enum HostEvent {
    /// An entity registry change.
    Registry(RegistryEvent),
    /// The `set_battery_replaced` command.
    SetBatteryReplaced {
        device_id: String,
        datetime: Option<OffsetDateTime>,
    },
    /// New options were saved.
    UpdateOptions(Options),
    /// A configuration entry was added.
    SetupEntry(EntryConfig),
    /// A configuration entry should be reloaded.
    ReloadEntry(String),
    /// A configuration entry was disabled.
    UnloadEntry(String),
    /// A configuration entry was deleted.
    RemoveEntry(String),
    /// Stop the dispatcher.
    Shutdown,
}

/// Apply host events to `hub` until the channel closes or `cancel` fires.
///
/// Returns the hub, with every entry unloaded.
pub async fn run(
    mut hub: BatteryNotes,
    mut events: mpsc::Receiver<HostEvent>,
    cancel: CancellationToken,
) -> BatteryNotes {
    info!("Dispatcher started with {} entries", hub.len());

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                info!("Dispatcher cancelled");
                break;
            }
            event = events.recv() => {
                match event {
                    Some(HostEvent::Shutdown) => {
                        info!("Dispatcher received shutdown");
                        break;
                    }
                    Some(event) => handle_event(&mut hub, event),
                    None => {
                        info!("Host event channel closed, stopping dispatcher");
                        break;
                    }
                }
            }
        }
    }

    hub.unload_all();
    info!("Dispatcher stopped");
    hub
}

fn handle_event(hub: &mut BatteryNotes, event: HostEvent) {
    debug!(?event, "Handling host event");

    let result = match event {
        HostEvent::Registry(event) => {
            for (entry_id, action) in hub.handle_registry_event(&event) {
                debug!("Entry {} reacted with {:?}", entry_id, action);
            }
            Ok(())
        }
        HostEvent::SetBatteryReplaced {
            device_id,
            datetime,
        } => hub.set_battery_replaced(&device_id, datetime).map(|_| ()),
        HostEvent::UpdateOptions(options) => hub.update_options(options),
        HostEvent::SetupEntry(config) => hub.setup_entry(config),
        HostEvent::ReloadEntry(entry_id) => hub.reload_entry(&entry_id),
        HostEvent::UnloadEntry(entry_id) => hub.unload_entry(&entry_id).map(|_| ()),
        HostEvent::RemoveEntry(entry_id) => hub.remove_entry(&entry_id),
        HostEvent::Shutdown => Ok(()),
    };

    if let Err(e) = result {
        error!("Host event failed: {}", e);
    }
}
