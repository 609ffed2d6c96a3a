//! Line-oriented terminal frontend.
//!
//! Commands typed at the prompt become [`MessageToBackend`] requests; every
//! [`MessageFromBackend`] event updates the [`entities::DataEntities`] and is
//! echoed to stdout. The terminal also plays the notification platform's
//! visible side: system notifications are printed and can be clicked with
//! `click <id>`.

use anyhow::Context;
use safecircle_bridge::{
    MessageFromBackend, MessageToBackend,
    contact::dial_uri,
    incident::IncidentReport,
    notification::{ClickContext, NotificationId, WindowId},
};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
};

use crate::{
    command::{Command, DialTarget, ParseError},
    entities::DataEntities,
};

pub mod command;
pub mod entities;
pub mod formatting;

#[derive(Clone)]
pub struct BackendBridge {
    pub to_backend: mpsc::Sender<MessageToBackend>,
}

impl BackendBridge {
    pub async fn send(&self, message: MessageToBackend) -> anyhow::Result<()> {
        self.to_backend
            .send(message)
            .await
            .context("the backend stopped listening")
    }

    pub async fn request_config(&self) -> anyhow::Result<()> {
        self.send(MessageToBackend::ConfigurationRequest).await
    }

    pub async fn report_navigation(&self, window_id: WindowId, url: String) -> anyhow::Result<()> {
        self.send(MessageToBackend::WindowNavigated { window_id, url })
            .await
    }
}

/// Outcome of handling one prompt line.
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

fn print_lines(lines: impl IntoIterator<Item = String>) {
    for line in lines {
        println!("{line}");
    }
}

fn dial(data: &DataEntities, target: DialTarget) -> String {
    match target.number() {
        Some(number) => format!("Call {number}: {}", dial_uri(number)),
        None => match data.session.contact {
            Some(ref contact) => format!("Call {}: {}", contact.name, contact.dial_uri()),
            None => "No emergency contact saved.".to_string(),
        },
    }
}

/// Resolves a command against the local state and forwards what the backend
/// has to handle.
async fn handle_command(
    bridge: &BackendBridge,
    data: &mut DataEntities,
    command: Command,
) -> anyhow::Result<Flow> {
    match command {
        Command::Help => println!("{}", command::HELP),
        Command::Quit => return Ok(Flow::Quit),
        Command::Backend(message) => bridge.send(message).await?,
        Command::SetDevicePosition(position) => {
            data.session.device_position = position;
            match position {
                Some(position) => {
                    println!("Device position set to {}", formatting::format_position(position))
                }
                None => println!("Device position unknown"),
            }
        }
        Command::Report {
            kind,
            custom_kind,
            description,
        } => {
            let report = IncidentReport {
                kind,
                custom_kind,
                description,
                position: data.session.device_position,
            };
            bridge.send(MessageToBackend::ReportIncident(report)).await?;
        }
        Command::ConfirmLocation {
            incident_id,
            position,
        } => {
            // The picker's marker starts on the device, or the map centre.
            let position = position
                .or(data.session.device_position)
                .unwrap_or(data.settings.config.map.default_center);
            bridge
                .send(MessageToBackend::SetIncidentLocation {
                    incident_id: incident_id.or_else(|| data.windows.pending_incident()),
                    position: Some(position),
                })
                .await?;
        }
        Command::ListIncidents => {
            bridge
                .send(MessageToBackend::IncidentsListRequest {
                    position: data.session.device_position,
                })
                .await?;
        }
        Command::Dial(target) => println!("{}", dial(data, target)),
        Command::ClickNotification { id, foreground } => {
            click_notification(bridge, data, id, foreground).await?
        }
        Command::Navigate(url) => {
            let window_id = data.windows.foreground;
            data.windows.navigate(window_id, &url);
            bridge.report_navigation(window_id, url).await?;
        }
        Command::Notifications => {
            if data.notifications.shown.is_empty() {
                println!("No notifications on screen.");
            }
            print_lines(
                data.notifications
                    .shown
                    .values()
                    .map(formatting::format_notification),
            );
        }
    }
    Ok(Flow::Continue)
}

async fn click_notification(
    bridge: &BackendBridge,
    data: &DataEntities,
    id: NotificationId,
    foreground: bool,
) -> anyhow::Result<()> {
    let Some(notification) = data.notifications.get(id) else {
        println!("No notification {id} on screen.");
        return Ok(());
    };
    let context = if foreground {
        ClickContext::Foreground
    } else {
        ClickContext::Background
    };
    bridge
        .send(MessageToBackend::NotificationClicked {
            notification: notification.clone(),
            context,
        })
        .await
}

async fn event_loop(
    mut rx: mpsc::Receiver<MessageFromBackend>,
    tx: mpsc::Sender<MessageToBackend>,
) -> anyhow::Result<()> {
    let bridge = BackendBridge { to_backend: tx };
    let mut data = DataEntities::default();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    bridge.request_config().await?;
    println!("Type `help` for a list of commands.");

    loop {
        tokio::select! {
            message = rx.recv() => match message {
                Some(message) => {
                    log::debug!("Got a message from backend: {message:?}");
                    print_lines(data.apply(message));
                }
                None => {
                    log::info!("Backend closed the bridge");
                    break;
                }
            },
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read from stdin")? else {
                    break;
                };
                match command::parse(&line) {
                    Ok(command) => {
                        if handle_command(&bridge, &mut data, command).await? == Flow::Quit {
                            break;
                        }
                    }
                    Err(ParseError::Empty) => {}
                    Err(error) => println!("{error}"),
                }
            }
        }
    }
    Ok(())
}

/// Runs the terminal frontend on the current thread until the user quits,
/// stdin closes, or the backend goes away.
pub fn run(
    rx: mpsc::Receiver<MessageFromBackend>,
    tx: mpsc::Sender<MessageToBackend>,
) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build the frontend runtime")?;
    runtime.block_on(event_loop(rx, tx))
}

#[cfg(test)]
mod tests {
    use safecircle_bridge::{
        contact::EmergencyContact,
        incident::{GeoPosition, IncidentId},
        routes,
    };

    use super::*;

    fn bridge() -> (BackendBridge, mpsc::Receiver<MessageToBackend>) {
        let (tx, rx) = mpsc::channel(8);
        (BackendBridge { to_backend: tx }, rx)
    }

    #[tokio::test]
    async fn reports_carry_the_device_position() {
        let (bridge, mut rx) = bridge();
        let mut data = DataEntities::default();
        data.session.device_position = Some(GeoPosition::new(51.5, -0.1));

        let command = command::parse("report Theft bike stolen").unwrap();
        handle_command(&bridge, &mut data, command).await.unwrap();

        assert_eq!(
            rx.recv().await,
            Some(MessageToBackend::ReportIncident(IncidentReport {
                kind: "Theft".into(),
                custom_kind: String::new(),
                description: "bike stolen".into(),
                position: Some(GeoPosition::new(51.5, -0.1)),
            }))
        );
    }

    #[tokio::test]
    async fn location_confirmation_fills_in_the_picker_state() {
        let (bridge, mut rx) = bridge();
        let mut data = DataEntities::default();
        data.windows
            .navigate(WindowId(0), &routes::report_location(&IncidentId("8".into())));

        handle_command(&bridge, &mut data, command::parse("location").unwrap())
            .await
            .unwrap();

        assert_eq!(
            rx.recv().await,
            Some(MessageToBackend::SetIncidentLocation {
                incident_id: Some(IncidentId("8".into())),
                position: Some(data.settings.config.map.default_center),
            })
        );
    }

    #[tokio::test]
    async fn unknown_notifications_are_not_clicked() {
        let (bridge, mut rx) = bridge();
        let mut data = DataEntities::default();

        handle_command(&bridge, &mut data, command::parse("click 3").unwrap())
            .await
            .unwrap();
        drop(bridge);

        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn local_navigation_is_reported() {
        let (bridge, mut rx) = bridge();
        let mut data = DataEntities::default();

        handle_command(&bridge, &mut data, command::parse("go /dashboard").unwrap())
            .await
            .unwrap();

        assert_eq!(data.windows.current_route(), routes::DASHBOARD);
        assert_eq!(
            rx.recv().await,
            Some(MessageToBackend::WindowNavigated {
                window_id: WindowId(0),
                url: routes::DASHBOARD.into(),
            })
        );
    }

    #[test]
    fn dialing_the_personal_contact() {
        let mut data = DataEntities::default();
        assert_eq!(
            dial(&data, DialTarget::PersonalContact),
            "No emergency contact saved."
        );
        data.session.contact = Some(EmergencyContact {
            user_id: "u".into(),
            name: "Sam".into(),
            phone: "07700 900123".into(),
        });
        assert_eq!(
            dial(&data, DialTarget::PersonalContact),
            "Call Sam: tel:07700900123"
        );
        assert_eq!(dial(&data, DialTarget::NonEmergency), "Call 111: tel:111");
    }
}
