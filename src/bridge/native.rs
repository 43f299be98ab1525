//! [`NativeBridge`] implementation backed by a dynamically loaded library.

use std::{
    ffi::{CStr, CString, c_char, c_void},
    ptr,
};

use libloading::Library;
use log::{debug, info, trace};
use secrecy::{ExposeSecret, SecretString};

use crate::bridge::{LoginResult, NativeBridge, OutboundMessage, locator::LibraryLocator};
use crate::error::{NotifierError, Result};

type SendMessageFn = unsafe extern "C" fn(
    message_kind: *const c_char,
    render_kind: *const c_char,
    body: *const c_char,
    recipient: *const c_char,
    session_store_path: *const c_char,
    access_token: *const c_char,
    recovery_key: *const c_char,
    pickle_key: *const c_char,
    destination_url: *const c_char,
    device_id: *const c_char,
    error: *mut *mut c_char,
) -> *mut c_char;

type LoginFn = unsafe extern "C" fn(
    homeserver: *const c_char,
    username: *const c_char,
    password: *const c_char,
    error: *mut *mut c_char,
    device_id: *mut *mut c_char,
    access_token: *mut *mut c_char,
);

type FreeFn = unsafe extern "C" fn(ptr: *mut c_void);

// Only valid when the engine shares our C runtime, which unix guarantees.
#[cfg(unix)]
unsafe extern "C" {
    fn free(ptr: *mut c_void);
}

/// Release function used when the engine doesn't export `FreeString`.
#[cfg(unix)]
fn fallback_free(missing: libloading::Error) -> std::result::Result<FreeFn, libloading::Error> {
    debug!("no FreeString export ({}), using the C runtime free", missing);
    Ok(free as FreeFn)
}

#[cfg(not(unix))]
fn fallback_free(missing: libloading::Error) -> std::result::Result<FreeFn, libloading::Error> {
    Err(missing)
}

/// String buffer owned by the native side, released exactly once on drop.
struct NativeString {
    ptr: *mut c_char,
    free: FreeFn,
}

impl NativeString {
    fn null(free: FreeFn) -> Self {
        NativeString {
            ptr: ptr::null_mut(),
            free,
        }
    }

    fn out_ptr(&mut self) -> *mut *mut c_char {
        &mut self.ptr
    }

    /// Text of the buffer, `None` when the engine left it null.
    fn decode(&self, field: &'static str) -> Result<Option<String>> {
        if self.ptr.is_null() {
            return Ok(None);
        }
        // SAFETY: non-null buffers returned by the engine are NUL-terminated C strings.
        let value = unsafe { CStr::from_ptr(self.ptr) };
        value
            .to_str()
            .map(|value| Some(value.to_owned()))
            .map_err(|_| NotifierError::InvalidNativeOutput { field })
    }

    /// Text of a buffer the engine must have filled.
    fn require(&self, field: &'static str) -> Result<String> {
        self.decode(field)?
            .ok_or(NotifierError::EmptyNativeResponse { field })
    }
}

impl Drop for NativeString {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            // SAFETY: the pointer came from the engine's allocator and is not used after this.
            unsafe { (self.free)(self.ptr.cast()) };
            self.ptr = ptr::null_mut();
        }
    }
}

fn to_c_string(field: &'static str, value: &str) -> Result<CString> {
    CString::new(value).map_err(|_| NotifierError::InvalidNativeArgument { field })
}

/// Native engine loaded from the platform artifact.
///
/// Loaded once and shared for the process lifetime. Buffers the engine
/// returns are released with its `FreeString` export when it has one; on unix
/// the C runtime `free` is used otherwise.
pub struct NativeLibrary {
    send_message: SendMessageFn,
    login: LoginFn,
    free: FreeFn,
    // Keeps the mapping alive for the function pointers above.
    _library: Option<Library>,
}

impl NativeLibrary {
    /// Locates and loads the engine for the running platform.
    ///
    /// # Errors
    ///
    /// - [`NotifierError::MissingNativeArtifact`] when the header is missing
    /// - [`NotifierError::NativeLoad`] when the object or one of its entry
    ///   points cannot be loaded
    pub fn load(locator: &LibraryLocator) -> Result<Self> {
        let paths = locator.locate()?;
        let object_path = paths.object_path.display().to_string();
        info!("loading native library {}", object_path);

        let load_error = |source: libloading::Error| NotifierError::NativeLoad {
            path: object_path.clone(),
            source,
        };

        // SAFETY: loading runs the library initializers, the artifact is the
        // engine built for this platform.
        let library = unsafe { Library::new(&paths.object_path) }.map_err(load_error)?;

        // SAFETY: the signatures match the exported SendMessage, Login and
        // FreeString symbols.
        let send_message = unsafe { library.get::<SendMessageFn>(b"SendMessage\0") }
            .map(|symbol| *symbol)
            .map_err(load_error)?;
        let login = unsafe { library.get::<LoginFn>(b"Login\0") }
            .map(|symbol| *symbol)
            .map_err(load_error)?;
        let free = match unsafe { library.get::<FreeFn>(b"FreeString\0") } {
            Ok(symbol) => *symbol,
            Err(missing) => fallback_free(missing).map_err(load_error)?,
        };

        debug!("native library loaded");

        Ok(NativeLibrary {
            send_message,
            login,
            free,
            _library: Some(library),
        })
    }

    #[cfg(test)]
    fn from_entry_points(send_message: SendMessageFn, login: LoginFn, free: FreeFn) -> Self {
        NativeLibrary {
            send_message,
            login,
            free,
            _library: None,
        }
    }
}

impl NativeBridge for NativeLibrary {
    fn send(&self, message: &OutboundMessage) -> Result<String> {
        let message_kind = to_c_string("message kind", message.message_kind.as_token())?;
        let render_kind = to_c_string("render kind", message.render_kind.as_token())?;
        let body = to_c_string("body", &message.body)?;
        let recipient = to_c_string("recipient", &message.recipient)?;
        let session_store_path = to_c_string("session store path", &message.session_store_path)?;
        let access_token = to_c_string("access token", message.access_token.expose_secret())?;
        let recovery_key = to_c_string("recovery key", message.recovery_key.expose_secret())?;
        let pickle_key = to_c_string("pickle key", message.pickle_key.expose_secret())?;
        let destination_url = to_c_string("destination url", &message.destination_url)?;
        let device_id = to_c_string("device id", &message.device_id)?;

        trace!(
            "calling SendMessage for {} at {}",
            message.recipient, message.destination_url
        );

        let mut error = NativeString::null(self.free);
        // SAFETY: every argument is a live NUL-terminated string for the whole
        // call and `error` points at a valid out slot.
        let result = NativeString {
            ptr: unsafe {
                (self.send_message)(
                    message_kind.as_ptr(),
                    render_kind.as_ptr(),
                    body.as_ptr(),
                    recipient.as_ptr(),
                    session_store_path.as_ptr(),
                    access_token.as_ptr(),
                    recovery_key.as_ptr(),
                    pickle_key.as_ptr(),
                    destination_url.as_ptr(),
                    device_id.as_ptr(),
                    error.out_ptr(),
                )
            },
            free: self.free,
        };

        if let Some(native_error) = error.decode("send error")? {
            debug!("SendMessage failed: {}", native_error);
            return Err(NotifierError::NativeSendFailure {
                message: native_error,
            });
        }

        result.require("message id")
    }

    fn login(
        &self,
        homeserver: &str,
        username: &str,
        password: &SecretString,
    ) -> Result<LoginResult> {
        let homeserver_c = to_c_string("homeserver", homeserver)?;
        let username_c = to_c_string("username", username)?;
        let password_c = to_c_string("password", password.expose_secret())?;

        trace!("calling Login for {} on {}", username, homeserver);

        let mut error = NativeString::null(self.free);
        let mut device_id = NativeString::null(self.free);
        let mut access_token = NativeString::null(self.free);
        // SAFETY: inputs are live NUL-terminated strings, out slots are valid.
        unsafe {
            (self.login)(
                homeserver_c.as_ptr(),
                username_c.as_ptr(),
                password_c.as_ptr(),
                error.out_ptr(),
                device_id.out_ptr(),
                access_token.out_ptr(),
            )
        };

        if let Some(native_error) = error.decode("login error")? {
            debug!("Login failed: {}", native_error);
            return Err(NotifierError::NativeLoginFailure {
                message: native_error,
            });
        }

        Ok(LoginResult {
            access_token: SecretString::from(access_token.require("access token")?),
            device_id: device_id.require("device ID")?,
        })
    }
}
