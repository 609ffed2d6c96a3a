//! Parsing of the lines typed at the prompt.

use std::str::FromStr;

use safecircle_bridge::{
    MessageToBackend,
    contact::{EMERGENCY_SERVICES_NUMBER, NON_EMERGENCY_NUMBER},
    incident::{GeoPosition, IncidentId},
    notification::NotificationId,
    preferences::{AlertFrequency, OTHER_INCIDENT_TYPE},
};

/// Errors produced for lines that are not a valid command.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// Blank line, nothing to do.
    #[error("empty command")]
    Empty,
    #[error("unknown command `{0}`, type `help` for a list")]
    Unknown(String),
    /// Right command, wrong arguments.
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("`{0}` is not a number")]
    InvalidNumber(String),
}

/// Who to call from the emergency screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialTarget {
    EmergencyServices,
    NonEmergency,
    PersonalContact,
}

impl DialTarget {
    /// Fixed number, `None` for the personal contact.
    pub fn number(&self) -> Option<&'static str> {
        match self {
            DialTarget::EmergencyServices => Some(EMERGENCY_SERVICES_NUMBER),
            DialTarget::NonEmergency => Some(NON_EMERGENCY_NUMBER),
            DialTarget::PersonalContact => None,
        }
    }
}

/// A parsed prompt line.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Quit,
    /// Forwarded to the backend as is.
    Backend(MessageToBackend),
    /// Sets or forgets the simulated device position.
    SetDevicePosition(Option<GeoPosition>),
    /// Report form; the device position is attached when sent.
    Report {
        kind: String,
        custom_kind: String,
        description: String,
    },
    /// Location picker confirmation. Missing parts are taken from the
    /// current route and the device position.
    ConfirmLocation {
        incident_id: Option<IncidentId>,
        position: Option<GeoPosition>,
    },
    ListIncidents,
    Dial(DialTarget),
    ClickNotification {
        id: NotificationId,
        foreground: bool,
    },
    /// Moves the foreground window to a route.
    Navigate(String),
    /// Shows the notifications still on screen.
    Notifications,
}

const USAGE_LOGIN: &str = "login <email> <password>";
const USAGE_REGISTER: &str = "register <email> <password>";
const USAGE_RESET: &str = "reset-password <new password>";
const USAGE_PREFS: &str = "prefs [set <low|medium|high|1-3> <Type,Type,...>]";
const USAGE_REPORT: &str = "report <Theft|Assault|Vandalism|Other:<custom>> <description>";
const USAGE_HERE: &str = "here <latitude> <longitude> | here off";
const USAGE_LOCATION: &str = "location [<incident id>] [<latitude> <longitude>]";
const USAGE_CONTACT: &str = "contact [set <phone> <name>]";
const USAGE_DIAL: &str = "dial <999|111|contact>";
const USAGE_CLICK: &str = "click <notification id> [fg]";
const USAGE_GO: &str = "go <route>";

pub const HELP: &str = "\
Commands:
  login <email> <password>          sign in
  register <email> <password>       create an account
  forgot <email>                    send a password reset mail
  reset-password <new password>     set a new password
  logout                            sign out
  prefs                             show alert preferences
  prefs set <frequency> <types>     save preferences, e.g. `prefs set high Assault,Theft`
  here <lat> <lon> | here off       set the device position
  report <type> <description>       report an incident at the device position
  location [<id>] [<lat> <lon>]     confirm the location of a reported incident
  incidents                         list reported incidents
  contact [set <phone> <name>]      show or save the emergency contact
  dial <999|111|contact>            show the number to call
  notifications                     list notifications on screen
  click <id> [fg]                   click a notification
  push [<json>]                     simulate a push message
  go <route>                        navigate the current window
  config                            show the configuration
  quit                              exit";

fn parse_number<T: FromStr>(value: &str) -> Result<T, ParseError> {
    value
        .parse()
        .map_err(|_| ParseError::InvalidNumber(value.to_string()))
}

fn parse_position(latitude: &str, longitude: &str) -> Result<GeoPosition, ParseError> {
    Ok(GeoPosition::new(
        parse_number(latitude)?,
        parse_number(longitude)?,
    ))
}

/// Splits the first word off a line.
fn split_word(line: &str) -> (&str, &str) {
    let line = line.trim();
    match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    }
}

fn credentials(rest: &str, usage: &'static str) -> Result<(String, String), ParseError> {
    match split_word(rest) {
        (email, password) if !email.is_empty() && !password.is_empty() => {
            Ok((email.to_string(), password.to_string()))
        }
        _ => Err(ParseError::Usage(usage)),
    }
}

fn parse_prefs(rest: &str) -> Result<Command, ParseError> {
    if rest.is_empty() {
        return Ok(Command::Backend(MessageToBackend::PreferencesRequest));
    }
    let (verb, rest) = split_word(rest);
    if verb != "set" {
        return Err(ParseError::Usage(USAGE_PREFS));
    }
    let (frequency, types) = split_word(rest);
    let frequency =
        AlertFrequency::from_str(frequency).map_err(|_| ParseError::Usage(USAGE_PREFS))?;
    let types = types
        .split(',')
        .map(str::trim)
        .filter(|kind| !kind.is_empty())
        .map(str::to_string)
        .collect();
    Ok(Command::Backend(MessageToBackend::SavePreferences {
        types,
        frequency,
    }))
}

fn parse_report(rest: &str) -> Result<Command, ParseError> {
    let (kind, description) = split_word(rest);
    if kind.is_empty() {
        return Err(ParseError::Usage(USAGE_REPORT));
    }
    let (kind, custom_kind) = match kind.split_once(':') {
        Some((OTHER_INCIDENT_TYPE, custom)) => (OTHER_INCIDENT_TYPE, custom.replace('_', " ")),
        _ => (kind, String::new()),
    };
    Ok(Command::Report {
        kind: kind.to_string(),
        custom_kind,
        description: description.to_string(),
    })
}

fn parse_location(rest: &str) -> Result<Command, ParseError> {
    let words: Vec<&str> = rest.split_whitespace().collect();
    let (incident_id, position) = match words.as_slice() {
        [] => (None, None),
        [id] => (Some(IncidentId(id.to_string())), None),
        [latitude, longitude] => (None, Some(parse_position(latitude, longitude)?)),
        [id, latitude, longitude] => (
            Some(IncidentId(id.to_string())),
            Some(parse_position(latitude, longitude)?),
        ),
        _ => return Err(ParseError::Usage(USAGE_LOCATION)),
    };
    Ok(Command::ConfirmLocation {
        incident_id,
        position,
    })
}

fn parse_contact(rest: &str) -> Result<Command, ParseError> {
    if rest.is_empty() {
        return Ok(Command::Backend(MessageToBackend::EmergencyContactRequest));
    }
    let (verb, rest) = split_word(rest);
    let (phone, name) = split_word(rest);
    if verb != "set" || phone.is_empty() || name.is_empty() {
        return Err(ParseError::Usage(USAGE_CONTACT));
    }
    Ok(Command::Backend(MessageToBackend::SaveEmergencyContact {
        name: name.to_string(),
        phone: phone.to_string(),
    }))
}

/// Parses one prompt line.
pub fn parse(line: &str) -> Result<Command, ParseError> {
    let (name, rest) = split_word(line);
    match name {
        "" => Err(ParseError::Empty),
        "help" | "?" => Ok(Command::Help),
        "quit" | "exit" => Ok(Command::Quit),
        "config" => Ok(Command::Backend(MessageToBackend::ConfigurationRequest)),
        "login" => {
            let (email, password) = credentials(rest, USAGE_LOGIN)?;
            Ok(Command::Backend(MessageToBackend::SignIn { email, password }))
        }
        "register" => {
            let (email, password) = credentials(rest, USAGE_REGISTER)?;
            Ok(Command::Backend(MessageToBackend::SignUp { email, password }))
        }
        "forgot" => Ok(Command::Backend(MessageToBackend::RequestPasswordReset {
            email: rest.to_string(),
        })),
        "reset-password" => {
            if rest.is_empty() {
                return Err(ParseError::Usage(USAGE_RESET));
            }
            Ok(Command::Backend(MessageToBackend::UpdatePassword {
                password: rest.to_string(),
            }))
        }
        "logout" => Ok(Command::Backend(MessageToBackend::SignOut)),
        "prefs" => parse_prefs(rest),
        "here" => match rest.split_whitespace().collect::<Vec<_>>().as_slice() {
            ["off"] => Ok(Command::SetDevicePosition(None)),
            [latitude, longitude] => Ok(Command::SetDevicePosition(Some(parse_position(
                latitude, longitude,
            )?))),
            _ => Err(ParseError::Usage(USAGE_HERE)),
        },
        "report" => parse_report(rest),
        "location" => parse_location(rest),
        "incidents" => Ok(Command::ListIncidents),
        "contact" => parse_contact(rest),
        "dial" => match rest {
            "999" => Ok(Command::Dial(DialTarget::EmergencyServices)),
            "111" => Ok(Command::Dial(DialTarget::NonEmergency)),
            "contact" => Ok(Command::Dial(DialTarget::PersonalContact)),
            _ => Err(ParseError::Usage(USAGE_DIAL)),
        },
        "notifications" => Ok(Command::Notifications),
        "click" => match rest.split_whitespace().collect::<Vec<_>>().as_slice() {
            [id] => Ok(Command::ClickNotification {
                id: NotificationId(parse_number(id)?),
                foreground: false,
            }),
            [id, "fg"] => Ok(Command::ClickNotification {
                id: NotificationId(parse_number(id)?),
                foreground: true,
            }),
            _ => Err(ParseError::Usage(USAGE_CLICK)),
        },
        "push" => Ok(Command::Backend(MessageToBackend::PushReceived(
            (!rest.is_empty()).then(|| rest.to_string()),
        ))),
        "go" => {
            if !rest.starts_with('/') {
                return Err(ParseError::Usage(USAGE_GO));
            }
            Ok(Command::Navigate(rest.to_string()))
        }
        other => Err(ParseError::Unknown(other.to_string())),
    }
}
