//! Raw AD structure encoding for advertising and scan response payloads.

use heapless::Vec;

use crate::gatt::uuids::ServiceUuid;

/// Legacy advertising PDU payload budget.
pub const ADVERTISEMENT_MAX_LEN: usize = 31;

const AD_TYPE_FLAGS: u8 = 0x01;
const AD_TYPE_COMPLETE_16BIT_SERVICE_LIST: u8 = 0x03;
const AD_TYPE_SHORTENED_LOCAL_NAME: u8 = 0x08;
const AD_TYPE_COMPLETE_LOCAL_NAME: u8 = 0x09;

const FLAG_LE_GENERAL_DISCOVERABLE: u8 = 0x02;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdvertiseError {
    TooLong,
}

pub(crate) type AdvertisementPayload = Vec<u8, ADVERTISEMENT_MAX_LEN>;

struct AdvertisementBuilder {
    data: AdvertisementPayload,
}

impl AdvertisementBuilder {
    fn new() -> Self {
        Self { data: Vec::new() }
    }

    fn raw(mut self, ad_type: u8, payload: &[u8]) -> Result<Self, AdvertiseError> {
        if self.data.len() + 2 + payload.len() > ADVERTISEMENT_MAX_LEN {
            return Err(AdvertiseError::TooLong);
        }
        self.data.push(payload.len() as u8 + 1).ok();
        self.data.push(ad_type).ok();
        self.data.extend_from_slice(payload).ok();
        Ok(self)
    }

    fn flags(self, flags: u8) -> Result<Self, AdvertiseError> {
        self.raw(AD_TYPE_FLAGS, &[flags])
    }

    fn services_16(self, services: &[ServiceUuid]) -> Result<Self, AdvertiseError> {
        let mut payload: Vec<u8, 8> = Vec::new();
        for service in services {
            payload
                .extend_from_slice(&service.uuid().as_u16().to_le_bytes())
                .map_err(|_| AdvertiseError::TooLong)?;
        }
        self.raw(AD_TYPE_COMPLETE_16BIT_SERVICE_LIST, &payload)
    }

    /// Local name, shortened when the remaining budget cuts it off.
    fn name(self, name: &str) -> Result<Self, AdvertiseError> {
        let remaining = ADVERTISEMENT_MAX_LEN - self.data.len() - 2;
        if name.len() <= remaining {
            self.raw(AD_TYPE_COMPLETE_LOCAL_NAME, name.as_bytes())
        } else {
            self.raw(AD_TYPE_SHORTENED_LOCAL_NAME, &name.as_bytes()[..remaining])
        }
    }

    fn build(self) -> AdvertisementPayload {
        self.data
    }
}

/// Advertising data: discoverability flags plus the service list. The name
/// goes in the scan response so the PDU stays small.
pub(crate) fn create_advertisement_data() -> Result<AdvertisementPayload, AdvertiseError> {
    Ok(AdvertisementBuilder::new()
        .flags(FLAG_LE_GENERAL_DISCOVERABLE)?
        .services_16(&[
            ServiceUuid::DeviceInformation,
            ServiceUuid::BatteryService,
            ServiceUuid::HidService,
        ])?
        .build())
}

pub(crate) fn create_scan_response(device_name: &str) -> Result<AdvertisementPayload, AdvertiseError> {
    Ok(AdvertisementBuilder::new().name(device_name)?.build())
}
