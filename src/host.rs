//! Vocabulary shared by the platform host traits of both transports.

use core::fmt;

/// Errors surfaced by the platform Bluetooth stacks.
///
/// Platform glue maps its native codes onto these; the engine decides per
/// call site whether a variant aborts initialization, becomes an event, or
/// is swallowed with a log line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HostError {
    /// The radio is off or the stack is not ready.
    PoweredOff,
    /// The platform cannot do this at all.
    Unsupported,
    /// Stop requested for something that is not running.
    AlreadyStopped,
    /// Start requested for something already running.
    AlreadyStarted,
    /// The stack rejected the request.
    Refused,
    /// The stack is busy; the request might succeed later.
    Busy,
    /// Unspecified platform failure.
    Failure,
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostError::PoweredOff => write!(f, "bluetooth powered off"),
            HostError::Unsupported => write!(f, "operation unsupported"),
            HostError::AlreadyStopped => write!(f, "already stopped"),
            HostError::AlreadyStarted => write!(f, "already started"),
            HostError::Refused => write!(f, "request refused"),
            HostError::Busy => write!(f, "stack busy"),
            HostError::Failure => write!(f, "platform failure"),
        }
    }
}

impl core::error::Error for HostError {}

/// Failures while installing a GATT service.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ServiceError {
    /// The stack refused to stage the service.
    Create(HostError),
    /// A characteristic could not be added after repeated attempts.
    RetriesExhausted,
    /// The stack rejected the registration outright.
    Register(HostError),
    /// The stack never confirmed the registration.
    RegistrationTimeout,
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::Create(e) => write!(f, "service creation failed: {}", e),
            ServiceError::RetriesExhausted => write!(f, "characteristic retries exhausted"),
            ServiceError::Register(e) => write!(f, "service registration failed: {}", e),
            ServiceError::RegistrationTimeout => write!(f, "service registration timed out"),
        }
    }
}

impl core::error::Error for ServiceError {}

/// Fatal activation errors. Anything recoverable is reported as an event
/// instead, see the `event` module.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InitError {
    /// The adapter is missing, disabled, or failed to open.
    BluetoothUnavailable,
    /// The adapter cannot advertise, so no central could ever find us.
    AdvertisingUnsupported,
    /// The classic HID device profile could not be acquired.
    ProfileUnavailable,
    /// A GATT service failed to install.
    ServiceRegistration(ServiceError),
}

impl fmt::Display for InitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitError::BluetoothUnavailable => write!(f, "bluetooth unavailable"),
            InitError::AdvertisingUnsupported => write!(f, "advertising unsupported"),
            InitError::ProfileUnavailable => write!(f, "hid profile unavailable"),
            InitError::ServiceRegistration(e) => write!(f, "{}", e),
        }
    }
}

impl core::error::Error for InitError {}

impl From<ServiceError> for InitError {
    fn from(error: ServiceError) -> Self {
        InitError::ServiceRegistration(error)
    }
}
