//! Windows audio device enumeration via the MMDevice API.
//!
//! Wraps `IMMDeviceEnumerator` to list active render and capture endpoints
//! with friendly names, in the stable order the capture engine assigns
//! ordinals over: render endpoints first, then capture endpoints.

use viz_capture_core::{CaptureError, DataFlow, EndpointInfo};
use windows::Win32::Devices::FunctionDiscovery::PKEY_Device_FriendlyName;
use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::StructuredStorage::PropVariantClear;
use windows::Win32::System::Com::*;
use windows::Win32::System::Variant::VT_LPWSTR;

/// Audio endpoint enumerator.
///
/// Requires COM to be initialized on the calling thread; all interfaces it
/// hands out are affine to that thread.
pub struct DeviceEnumerator {
    enumerator: IMMDeviceEnumerator,
}

impl DeviceEnumerator {
    pub fn new() -> Result<Self, CaptureError> {
        unsafe {
            let enumerator: IMMDeviceEnumerator =
                CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL).map_err(|e| {
                    CaptureError::Unknown(format!("failed to create enumerator: {}", e))
                })?;
            Ok(Self { enumerator })
        }
    }

    /// List every endpoint currently in the active state.
    ///
    /// A pure query: no endpoint is activated or otherwise mutated. The
    /// returned `IMMDevice` handles stay usable until the devices
    /// themselves go away.
    pub fn list_active(&self) -> Result<Vec<(IMMDevice, EndpointInfo)>, CaptureError> {
        let mut listing = Vec::new();
        self.append_endpoints(&mut listing, eRender, DataFlow::Render)?;
        self.append_endpoints(&mut listing, eCapture, DataFlow::Capture)?;
        Ok(listing)
    }

    /// The OS default render endpoint, backing the synthetic loopback target.
    pub fn default_render_device(&self) -> Result<IMMDevice, CaptureError> {
        unsafe {
            self.enumerator
                .GetDefaultAudioEndpoint(eRender, eConsole)
                .map_err(|e| {
                    CaptureError::Unknown(format!("GetDefaultAudioEndpoint failed: {}", e))
                })
        }
    }

    fn append_endpoints(
        &self,
        listing: &mut Vec<(IMMDevice, EndpointInfo)>,
        data_flow: EDataFlow,
        direction: DataFlow,
    ) -> Result<(), CaptureError> {
        unsafe {
            let collection = self
                .enumerator
                .EnumAudioEndpoints(data_flow, DEVICE_STATE_ACTIVE)
                .map_err(|e| {
                    CaptureError::EnumerationFailed(format!("EnumAudioEndpoints failed: {}", e))
                })?;

            let count = collection
                .GetCount()
                .map_err(|e| CaptureError::EnumerationFailed(format!("GetCount failed: {}", e)))?;

            for i in 0..count {
                let device = match collection.Item(i) {
                    Ok(d) => d,
                    Err(_) => continue,
                };

                let display_name = Self::friendly_name(&device)
                    .unwrap_or_else(|| format!("Device {}", listing.len()));

                listing.push((
                    device,
                    EndpointInfo {
                        display_name,
                        direction,
                    },
                ));
            }
        }
        Ok(())
    }

    /// Read the PKEY_Device_FriendlyName property from a device.
    fn friendly_name(device: &IMMDevice) -> Option<String> {
        unsafe {
            let store = device.OpenPropertyStore(STGM_READ).ok()?;

            let mut prop_variant = std::mem::zeroed::<PROPVARIANT>();
            store
                .GetValue(&PKEY_Device_FriendlyName, &mut prop_variant)
                .ok()?;

            let name = if prop_variant.Anonymous.Anonymous.vt == VT_LPWSTR {
                let pwsz = prop_variant.Anonymous.Anonymous.Anonymous.pwszVal;
                if !pwsz.is_null() {
                    let len = (0..).take_while(|&i| *pwsz.offset(i) != 0).count();
                    Some(String::from_utf16_lossy(std::slice::from_raw_parts(
                        pwsz, len,
                    )))
                } else {
                    None
                }
            } else {
                None
            };

            PropVariantClear(&mut prop_variant).ok();
            name
        }
    }
}
