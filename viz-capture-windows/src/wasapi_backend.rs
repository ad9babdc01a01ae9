//! WASAPI capture backend: thread-affine COM state plus session opening.

use viz_capture_core::{
    CaptureBackend, CaptureError, DeviceDescriptor, EndpointInfo, DEFAULT_ORDINAL,
};
use windows::core::PCWSTR;
use windows::Win32::Media::Audio::IMMDevice;
use windows::Win32::System::Com::{CoInitializeEx, CoUninitialize, COINIT_MULTITHREADED};
use windows::Win32::System::Threading::AvSetMmThreadCharacteristicsW;

use crate::device_enumerator::DeviceEnumerator;
use crate::wasapi_session::WasapiSession;

/// Balances `CoInitializeEx` when the backend is dropped.
struct ComGuard;

impl ComGuard {
    fn init() -> Result<Self, CaptureError> {
        unsafe {
            CoInitializeEx(None, COINIT_MULTITHREADED)
                .ok()
                .map_err(|e| CaptureError::Unknown(format!("CoInitializeEx failed: {}", e)))?;
        }
        Ok(Self)
    }
}

impl Drop for ComGuard {
    fn drop(&mut self) {
        unsafe {
            CoUninitialize();
        }
    }
}

/// WASAPI backend. One instance per capture thread.
///
/// Initializes a multithreaded COM apartment for the constructing thread
/// and keeps the `IMMDevice` handles of the last enumeration, so a
/// positive ordinal opens exactly the device that listing reported. An
/// ordinal beyond the cached listing means the device vanished.
pub struct WasapiBackend {
    enumerator: DeviceEnumerator,
    cache: Vec<IMMDevice>,
    // Declared last: COM must outlive every interface above.
    _com: ComGuard,
}

impl WasapiBackend {
    /// Create a backend on the current thread.
    ///
    /// Must run on the capture thread — the COM apartment and every
    /// interface this backend hands out are affine to it. The thread is
    /// also registered with MMCSS; failing that only costs scheduling
    /// priority.
    pub fn new() -> Result<Self, CaptureError> {
        let com = ComGuard::init()?;
        let enumerator = DeviceEnumerator::new()?;

        unsafe {
            let mut task_index: u32 = 0;
            let task_name: Vec<u16> = "Pro Audio\0".encode_utf16().collect();
            let _ = AvSetMmThreadCharacteristicsW(PCWSTR(task_name.as_ptr()), &mut task_index);
        }

        Ok(Self {
            enumerator,
            cache: Vec::new(),
            _com: com,
        })
    }
}

impl CaptureBackend for WasapiBackend {
    type Session = WasapiSession;

    fn list_endpoints(&mut self) -> Result<Vec<EndpointInfo>, CaptureError> {
        let listing = self.enumerator.list_active()?;
        let (devices, infos): (Vec<IMMDevice>, Vec<EndpointInfo>) = listing.into_iter().unzip();
        self.cache = devices;
        Ok(infos)
    }

    fn open_session(
        &mut self,
        target: &DeviceDescriptor,
        loopback: bool,
    ) -> Result<WasapiSession, CaptureError> {
        let device = if target.ordinal == DEFAULT_ORDINAL {
            self.enumerator.default_render_device()?
        } else {
            usize::try_from(target.ordinal)
                .ok()
                .and_then(|i| self.cache.get(i))
                .cloned()
                .ok_or(CaptureError::DeviceVanished(target.ordinal))?
        };

        WasapiSession::open(&device, loopback)
    }
}
