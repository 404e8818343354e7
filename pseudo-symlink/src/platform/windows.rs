//! `Platform` over the Win32 file / DOS-device APIs and the native registry calls in `ntdll`.
//!
//! Every handle is owned by an RAII value (`File`, `OwnedHandle`, `KeyHandle`) so it is released
//! on every exit path, including `?` returns.
use super::{KeyKind, Platform};

use std::ffi::c_void;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::os::windows::ffi::{OsStrExt, OsStringExt};
use std::os::windows::fs::{MetadataExt, OpenOptionsExt};
use std::os::windows::io::{AsRawHandle, FromRawHandle, OwnedHandle, RawHandle};
use std::path::{Path, PathBuf};
use std::ptr;

use windows_sys::Win32::Foundation::{
    LocalFree, ERROR_FILE_NOT_FOUND, ERROR_NOT_A_REPARSE_POINT, HANDLE,
};
use windows_sys::Win32::Security::Authorization::ConvertSidToStringSidW;
use windows_sys::Win32::Security::{GetTokenInformation, TokenUser, TOKEN_QUERY, TOKEN_USER};
use windows_sys::Win32::Storage::FileSystem::{
    DefineDosDeviceW, GetFullPathNameW, QueryDosDeviceW, DDD_EXACT_MATCH_ON_REMOVE,
    DDD_NO_BROADCAST_SYSTEM, DDD_RAW_TARGET_PATH, DDD_REMOVE_DEFINITION,
    FILE_ATTRIBUTE_DIRECTORY, FILE_FLAG_BACKUP_SEMANTICS, FILE_FLAG_OPEN_REPARSE_POINT,
};
use windows_sys::Win32::System::Ioctl::{
    FSCTL_DELETE_REPARSE_POINT, FSCTL_GET_REPARSE_POINT, FSCTL_SET_REPARSE_POINT,
};
use windows_sys::Win32::System::Threading::{GetCurrentProcess, OpenProcessToken};
use windows_sys::Win32::System::IO::DeviceIoControl;

use crate::reparse::MAXIMUM_REPARSE_DATA_BUFFER_SIZE;

use self::ntdll::{
    KeyHandle, ObjectAttributes, UnicodeString, KEY_CREATE_LINK, KEY_ENUMERATE_SUB_KEYS,
    KEY_QUERY_VALUE, KEY_SET_VALUE, REG_LINK, REG_OPENED_EXISTING_KEY, REG_OPTION_CREATE_LINK,
    REG_OPTION_VOLATILE, STATUS_BUFFER_OVERFLOW, STATUS_BUFFER_TOO_SMALL, STATUS_NO_MORE_ENTRIES,
    STATUS_OBJECT_NAME_NOT_FOUND, STATUS_OBJECT_PATH_NOT_FOUND,
};

const LINK_VALUE_NAME: &str = "SymbolicLinkValue";
const DEVICE_TARGET_CAPACITY: usize = 32 * 1024;

// The registry calls (and their structures) are not exposed by windows-sys' Win32 surface.
mod ntdll {
    use std::ffi::c_void;
    use std::io;
    use windows_sys::Win32::Foundation::{HANDLE, NTSTATUS};

    pub const OBJ_CASE_INSENSITIVE: u32 = 0x0000_0040;
    pub const OBJ_OPENLINK: u32 = 0x0000_0100;

    pub const KEY_QUERY_VALUE: u32 = 0x0001;
    pub const KEY_SET_VALUE: u32 = 0x0002;
    pub const KEY_ENUMERATE_SUB_KEYS: u32 = 0x0008;
    pub const KEY_CREATE_LINK: u32 = 0x0020;
    pub const DELETE: u32 = 0x0001_0000;

    pub const REG_OPTION_VOLATILE: u32 = 0x0000_0001;
    pub const REG_OPTION_CREATE_LINK: u32 = 0x0000_0002;
    pub const REG_OPENED_EXISTING_KEY: u32 = 0x0000_0002;
    pub const REG_LINK: u32 = 6;

    pub const KEY_BASIC_INFORMATION: u32 = 0;
    pub const KEY_VALUE_PARTIAL_INFORMATION: u32 = 2;

    pub const STATUS_BUFFER_OVERFLOW: NTSTATUS = 0x8000_0005_u32 as NTSTATUS;
    pub const STATUS_NO_MORE_ENTRIES: NTSTATUS = 0x8000_001A_u32 as NTSTATUS;
    pub const STATUS_BUFFER_TOO_SMALL: NTSTATUS = 0xC000_0023_u32 as NTSTATUS;
    pub const STATUS_OBJECT_NAME_NOT_FOUND: NTSTATUS = 0xC000_0034_u32 as NTSTATUS;
    pub const STATUS_OBJECT_PATH_NOT_FOUND: NTSTATUS = 0xC000_003A_u32 as NTSTATUS;

    #[repr(C)]
    pub struct UnicodeString {
        pub length: u16,
        pub maximum_length: u16,
        pub buffer: *const u16,
    }

    #[repr(C)]
    pub struct ObjectAttributes {
        pub length: u32,
        pub root_directory: HANDLE,
        pub object_name: *const UnicodeString,
        pub attributes: u32,
        pub security_descriptor: *const c_void,
        pub security_quality_of_service: *const c_void,
    }

    #[link(name = "ntdll")]
    extern "system" {
        pub fn NtCreateKey(
            key_handle: *mut HANDLE,
            desired_access: u32,
            object_attributes: *const ObjectAttributes,
            title_index: u32,
            class: *const UnicodeString,
            create_options: u32,
            disposition: *mut u32,
        ) -> NTSTATUS;
        pub fn NtOpenKey(
            key_handle: *mut HANDLE,
            desired_access: u32,
            object_attributes: *const ObjectAttributes,
        ) -> NTSTATUS;
        pub fn NtSetValueKey(
            key_handle: HANDLE,
            value_name: *const UnicodeString,
            title_index: u32,
            value_type: u32,
            data: *const c_void,
            data_size: u32,
        ) -> NTSTATUS;
        pub fn NtQueryValueKey(
            key_handle: HANDLE,
            value_name: *const UnicodeString,
            information_class: u32,
            information: *mut c_void,
            length: u32,
            result_length: *mut u32,
        ) -> NTSTATUS;
        pub fn NtEnumerateKey(
            key_handle: HANDLE,
            index: u32,
            information_class: u32,
            information: *mut c_void,
            length: u32,
            result_length: *mut u32,
        ) -> NTSTATUS;
        pub fn NtDeleteKey(key_handle: HANDLE) -> NTSTATUS;
        pub fn NtClose(handle: HANDLE) -> NTSTATUS;
        pub fn RtlNtStatusToDosError(status: NTSTATUS) -> u32;
    }

    #[inline]
    pub fn nt_success(status: NTSTATUS) -> bool {
        status >= 0
    }

    pub fn status_error(status: NTSTATUS) -> io::Error {
        // SAFETY: pure translation table lookup.
        let code = unsafe { RtlNtStatusToDosError(status) };
        io::Error::from_raw_os_error(code as i32)
    }

    /// Open registry key, closed with `NtClose` on drop.
    pub struct KeyHandle(pub HANDLE);

    impl Drop for KeyHandle {
        fn drop(&mut self) {
            // SAFETY: the handle was returned by NtCreateKey/NtOpenKey and is closed only here.
            unsafe {
                NtClose(self.0);
            }
        }
    }
}

/// SUMMARY:
/// The real Windows call surface.
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowsPlatform;

impl WindowsPlatform {
    pub fn new() -> Self {
        Self
    }
}

fn wide(value: &str) -> Vec<u16> {
    value.encode_utf16().chain(std::iter::once(0)).collect()
}

fn wide_path(path: &Path) -> Vec<u16> {
    path.as_os_str().encode_wide().chain(std::iter::once(0)).collect()
}

fn from_wide(units: &[u16]) -> String {
    let end = units.iter().position(|&u| u == 0).unwrap_or(units.len());
    String::from_utf16_lossy(&units[..end])
}

// u64 backing keeps reparse and registry information structures 8-byte aligned.
fn aligned_buffer(bytes: usize) -> Vec<u64> {
    vec![0u64; bytes.div_ceil(8)]
}

fn as_bytes(buffer: &[u64]) -> &[u8] {
    // SAFETY: u64 has no padding and any bit pattern is a valid u8.
    unsafe { std::slice::from_raw_parts(buffer.as_ptr().cast::<u8>(), buffer.len() * 8) }
}

fn open_reparse_handle(path: &Path, write: bool) -> io::Result<File> {
    OpenOptions::new()
        .read(true)
        .write(write)
        .custom_flags(FILE_FLAG_BACKUP_SEMANTICS | FILE_FLAG_OPEN_REPARSE_POINT)
        .open(path)
}

fn reparse_control(file: &File, code: u32, input: &[u8]) -> io::Result<()> {
    let mut staged = aligned_buffer(input.len());
    // SAFETY: staged holds at least input.len() bytes.
    unsafe {
        ptr::copy_nonoverlapping(input.as_ptr(), staged.as_mut_ptr().cast::<u8>(), input.len());
    }
    let mut returned = 0u32;
    // SAFETY: the handle is live for the duration of the call; buffers outlive it.
    let ok = unsafe {
        DeviceIoControl(
            file.as_raw_handle() as HANDLE,
            code,
            staged.as_ptr().cast::<c_void>(),
            input.len() as u32,
            ptr::null_mut(),
            0,
            &mut returned,
            ptr::null_mut(),
        )
    };
    if ok == 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

impl Platform for WindowsPlatform {
    fn absolute_path(&self, path: &Path) -> io::Result<PathBuf> {
        let input = wide_path(path);
        let mut capacity = 260u32;
        loop {
            let mut output = vec![0u16; capacity as usize];
            // SAFETY: output has `capacity` units; the file-part pointer is not requested.
            let len = unsafe {
                GetFullPathNameW(input.as_ptr(), capacity, output.as_mut_ptr(), ptr::null_mut())
            };
            if len == 0 {
                return Err(io::Error::last_os_error());
            }
            if len < capacity {
                output.truncate(len as usize);
                return Ok(PathBuf::from(std::ffi::OsString::from_wide(&output)));
            }
            capacity = len;
        }
    }

    fn dir_exists(&self, path: &Path) -> bool {
        fs::symlink_metadata(path)
            .map(|meta| meta.file_attributes() & FILE_ATTRIBUTE_DIRECTORY != 0)
            .unwrap_or(false)
    }

    fn create_dir(&self, path: &Path) -> io::Result<()> {
        fs::create_dir(path)
    }

    fn dir_is_empty(&self, path: &Path) -> io::Result<bool> {
        Ok(fs::read_dir(path)?.next().is_none())
    }

    fn clear_dir(&self, path: &Path) -> io::Result<()> {
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            let kind = entry.file_type()?;
            let child = entry.path();
            if kind.is_symlink() {
                // Junctions and directory symlinks are directories without contents of their own.
                fs::remove_dir(&child).or_else(|_| fs::remove_file(&child))?;
            } else if kind.is_dir() {
                fs::remove_dir_all(&child)?;
            } else {
                fs::remove_file(&child)?;
            }
        }
        Ok(())
    }

    fn remove_dir(&self, path: &Path) -> io::Result<()> {
        fs::remove_dir(path)
    }

    fn get_reparse_point(&self, path: &Path) -> io::Result<Option<Vec<u8>>> {
        let file = open_reparse_handle(path, false)?;
        let mut output = aligned_buffer(MAXIMUM_REPARSE_DATA_BUFFER_SIZE);
        let mut returned = 0u32;
        // SAFETY: output spans MAXIMUM_REPARSE_DATA_BUFFER_SIZE bytes; the handle is live.
        let ok = unsafe {
            DeviceIoControl(
                file.as_raw_handle() as HANDLE,
                FSCTL_GET_REPARSE_POINT,
                ptr::null(),
                0,
                output.as_mut_ptr().cast::<c_void>(),
                MAXIMUM_REPARSE_DATA_BUFFER_SIZE as u32,
                &mut returned,
                ptr::null_mut(),
            )
        };
        if ok == 0 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() == Some(ERROR_NOT_A_REPARSE_POINT as i32) {
                return Ok(None);
            }
            return Err(err);
        }
        Ok(Some(as_bytes(&output)[..returned as usize].to_vec()))
    }

    fn set_reparse_point(&self, path: &Path, buffer: &[u8]) -> io::Result<()> {
        let file = open_reparse_handle(path, true)?;
        reparse_control(&file, FSCTL_SET_REPARSE_POINT, buffer)
    }

    fn delete_reparse_point(&self, path: &Path, buffer: &[u8]) -> io::Result<()> {
        let file = open_reparse_handle(path, true)?;
        reparse_control(&file, FSCTL_DELETE_REPARSE_POINT, buffer)
    }

    fn query_dos_device(&self, name: &str) -> io::Result<Option<String>> {
        let name = wide(name);
        let mut output = vec![0u16; DEVICE_TARGET_CAPACITY];
        // SAFETY: output has DEVICE_TARGET_CAPACITY units.
        let len = unsafe {
            QueryDosDeviceW(name.as_ptr(), output.as_mut_ptr(), DEVICE_TARGET_CAPACITY as u32)
        };
        if len == 0 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() == Some(ERROR_FILE_NOT_FOUND as i32) {
                return Ok(None);
            }
            return Err(err);
        }
        // The result is a list of NUL-terminated strings; the first is the active definition.
        Ok(Some(from_wide(&output[..len as usize])))
    }

    fn define_dos_device(&self, name: &str, target: &str) -> io::Result<()> {
        let (name, target) = (wide(name), wide(target));
        // SAFETY: both strings are NUL-terminated and outlive the call.
        let ok = unsafe {
            DefineDosDeviceW(
                DDD_RAW_TARGET_PATH | DDD_NO_BROADCAST_SYSTEM,
                name.as_ptr(),
                target.as_ptr(),
            )
        };
        if ok == 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn remove_dos_device(&self, name: &str, target: &str) -> io::Result<()> {
        let (name, target) = (wide(name), wide(target));
        // SAFETY: both strings are NUL-terminated and outlive the call.
        let ok = unsafe {
            DefineDosDeviceW(
                DDD_RAW_TARGET_PATH
                    | DDD_REMOVE_DEFINITION
                    | DDD_EXACT_MATCH_ON_REMOVE
                    | DDD_NO_BROADCAST_SYSTEM,
                name.as_ptr(),
                target.as_ptr(),
            )
        };
        if ok == 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn query_key(&self, path: &str) -> io::Result<KeyKind> {
        let key = match open_key(path, KEY_QUERY_VALUE) {
            Ok(key) => key,
            Err(status) if is_not_found(status) => return Ok(KeyKind::Missing),
            Err(status) => return Err(ntdll::status_error(status)),
        };
        match query_link_value(&key)? {
            Some(target) => Ok(KeyKind::Link(target)),
            None => Ok(KeyKind::Plain),
        }
    }

    fn create_link_key(&self, path: &str, volatile: bool) -> io::Result<()> {
        let name = NativeName::new(path)?;
        let attributes = name.attributes();
        let mut options = REG_OPTION_CREATE_LINK;
        if volatile {
            options |= REG_OPTION_VOLATILE;
        }
        let mut handle: HANDLE = 0 as _;
        let mut disposition = 0u32;
        // SAFETY: attributes reference `name`, which outlives the call.
        let status = unsafe {
            ntdll::NtCreateKey(
                &mut handle,
                KEY_CREATE_LINK | KEY_SET_VALUE,
                &attributes,
                0,
                ptr::null(),
                options,
                &mut disposition,
            )
        };
        if !ntdll::nt_success(status) {
            return Err(ntdll::status_error(status));
        }
        let _key = KeyHandle(handle);
        if disposition == REG_OPENED_EXISTING_KEY {
            return Err(io::Error::from(io::ErrorKind::AlreadyExists));
        }
        Ok(())
    }

    fn set_link_value(&self, path: &str, target: &str) -> io::Result<()> {
        let key = open_key(path, KEY_SET_VALUE).map_err(ntdll::status_error)?;
        let value_name = NativeName::new(LINK_VALUE_NAME)?;
        // The link value is stored without a terminating NUL.
        let data: Vec<u16> = target.encode_utf16().collect();
        // SAFETY: the key handle is live; value name and data outlive the call.
        let status = unsafe {
            ntdll::NtSetValueKey(
                key.0,
                &value_name.unicode,
                0,
                REG_LINK,
                data.as_ptr().cast::<c_void>(),
                (data.len() * 2) as u32,
            )
        };
        if !ntdll::nt_success(status) {
            return Err(ntdll::status_error(status));
        }
        Ok(())
    }

    fn delete_key(&self, path: &str) -> io::Result<()> {
        let key = open_key(path, ntdll::DELETE).map_err(ntdll::status_error)?;
        // SAFETY: the key handle is live.
        let status = unsafe { ntdll::NtDeleteKey(key.0) };
        if !ntdll::nt_success(status) {
            return Err(ntdll::status_error(status));
        }
        Ok(())
    }

    fn delete_key_tree(&self, path: &str) -> io::Result<()> {
        let children = {
            let key = open_key(path, KEY_ENUMERATE_SUB_KEYS).map_err(ntdll::status_error)?;
            enumerate_subkeys(&key)?
        };
        for child in children {
            self.delete_key_tree(&format!(r"{path}\{child}"))?;
        }
        self.delete_key(path)
    }

    fn current_user_sid(&self) -> io::Result<String> {
        let mut raw: HANDLE = 0 as _;
        // SAFETY: the pseudo handle of the current process needs no closing.
        if unsafe { OpenProcessToken(GetCurrentProcess(), TOKEN_QUERY, &mut raw) } == 0 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: `raw` is a freshly opened token handle owned by nobody else.
        let token = unsafe { OwnedHandle::from_raw_handle(raw as RawHandle) };

        let mut needed = 0u32;
        // SAFETY: size query with an empty buffer.
        unsafe {
            GetTokenInformation(
                token.as_raw_handle() as HANDLE,
                TokenUser,
                ptr::null_mut(),
                0,
                &mut needed,
            )
        };
        if needed == 0 {
            return Err(io::Error::last_os_error());
        }
        let mut info = aligned_buffer(needed as usize);
        // SAFETY: info spans `needed` bytes.
        let ok = unsafe {
            GetTokenInformation(
                token.as_raw_handle() as HANDLE,
                TokenUser,
                info.as_mut_ptr().cast::<c_void>(),
                needed,
                &mut needed,
            )
        };
        if ok == 0 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: the call above filled `info` with a TOKEN_USER at its (aligned) start.
        let user = unsafe { &*info.as_ptr().cast::<TOKEN_USER>() };

        let mut string_sid: *mut u16 = ptr::null_mut();
        // SAFETY: the SID points into `info`, which is alive.
        if unsafe { ConvertSidToStringSidW(user.User.Sid, &mut string_sid) } == 0 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: ConvertSidToStringSidW returns a NUL-terminated string allocated with LocalAlloc.
        let sid = unsafe {
            let mut len = 0usize;
            while *string_sid.add(len) != 0 {
                len += 1;
            }
            let sid = String::from_utf16_lossy(std::slice::from_raw_parts(string_sid, len));
            LocalFree(string_sid as _);
            sid
        };
        Ok(sid)
    }
}

// UTF-16 name plus the UNICODE_STRING describing it; the vector must outlive the descriptor.
struct NativeName {
    _units: Vec<u16>,
    unicode: UnicodeString,
}

impl NativeName {
    fn new(value: &str) -> io::Result<Self> {
        let units: Vec<u16> = value.encode_utf16().collect();
        let bytes = u16::try_from(units.len() * 2)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "registry path too long"))?;
        let unicode = UnicodeString {
            length: bytes,
            maximum_length: bytes,
            buffer: units.as_ptr(),
        };
        Ok(Self {
            _units: units,
            unicode,
        })
    }

    // Case-insensitive, and never resolves a link key to its target.
    fn attributes(&self) -> ObjectAttributes {
        ObjectAttributes {
            length: std::mem::size_of::<ObjectAttributes>() as u32,
            root_directory: 0 as _,
            object_name: &self.unicode,
            attributes: ntdll::OBJ_CASE_INSENSITIVE | ntdll::OBJ_OPENLINK,
            security_descriptor: ptr::null(),
            security_quality_of_service: ptr::null(),
        }
    }
}

fn is_not_found(status: i32) -> bool {
    status == STATUS_OBJECT_NAME_NOT_FOUND || status == STATUS_OBJECT_PATH_NOT_FOUND
}

fn open_key(path: &str, access: u32) -> Result<KeyHandle, i32> {
    let name = NativeName::new(path).map_err(|_| STATUS_OBJECT_PATH_NOT_FOUND)?;
    let attributes = name.attributes();
    let mut handle: HANDLE = 0 as _;
    // SAFETY: attributes reference `name`, which outlives the call.
    let status = unsafe { ntdll::NtOpenKey(&mut handle, access, &attributes) };
    if !ntdll::nt_success(status) {
        return Err(status);
    }
    Ok(KeyHandle(handle))
}

// KEY_VALUE_PARTIAL_INFORMATION: TitleIndex, Type, DataLength, then Data.
const PARTIAL_INFORMATION_HEADER: usize = 12;

fn query_link_value(key: &KeyHandle) -> io::Result<Option<String>> {
    let value_name = NativeName::new(LINK_VALUE_NAME)?;
    let mut capacity = PARTIAL_INFORMATION_HEADER + 512;
    loop {
        let mut info = aligned_buffer(capacity);
        let mut needed = 0u32;
        // SAFETY: info spans at least `capacity` bytes; the key handle is live.
        let status = unsafe {
            ntdll::NtQueryValueKey(
                key.0,
                &value_name.unicode,
                ntdll::KEY_VALUE_PARTIAL_INFORMATION,
                info.as_mut_ptr().cast::<c_void>(),
                capacity as u32,
                &mut needed,
            )
        };
        if status == STATUS_BUFFER_OVERFLOW || status == STATUS_BUFFER_TOO_SMALL {
            capacity = (needed as usize).max(capacity * 2);
            continue;
        }
        if status == STATUS_OBJECT_NAME_NOT_FOUND {
            return Ok(None);
        }
        if !ntdll::nt_success(status) {
            return Err(ntdll::status_error(status));
        }

        let bytes = as_bytes(&info);
        let read_u32 = |at: usize| u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
        if read_u32(4) != REG_LINK {
            return Ok(None);
        }
        let data_len = (read_u32(8) as usize).min(bytes.len() - PARTIAL_INFORMATION_HEADER);
        let units: Vec<u16> = bytes[PARTIAL_INFORMATION_HEADER..PARTIAL_INFORMATION_HEADER + data_len]
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        return Ok(Some(from_wide(&units)));
    }
}

// KEY_BASIC_INFORMATION: LastWriteTime, TitleIndex, NameLength, then Name.
const BASIC_INFORMATION_HEADER: usize = 16;

fn enumerate_subkeys(key: &KeyHandle) -> io::Result<Vec<String>> {
    let mut names = Vec::new();
    let mut capacity = BASIC_INFORMATION_HEADER + 512;
    let mut index = 0u32;
    loop {
        let mut info = aligned_buffer(capacity);
        let mut needed = 0u32;
        // SAFETY: info spans at least `capacity` bytes; the key handle is live.
        let status = unsafe {
            ntdll::NtEnumerateKey(
                key.0,
                index,
                ntdll::KEY_BASIC_INFORMATION,
                info.as_mut_ptr().cast::<c_void>(),
                capacity as u32,
                &mut needed,
            )
        };
        if status == STATUS_NO_MORE_ENTRIES {
            return Ok(names);
        }
        if status == STATUS_BUFFER_OVERFLOW || status == STATUS_BUFFER_TOO_SMALL {
            capacity = (needed as usize).max(capacity * 2);
            continue;
        }
        if !ntdll::nt_success(status) {
            return Err(ntdll::status_error(status));
        }

        let bytes = as_bytes(&info);
        let name_len = u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]) as usize;
        let name_len = name_len.min(bytes.len() - BASIC_INFORMATION_HEADER);
        let units: Vec<u16> = bytes[BASIC_INFORMATION_HEADER..BASIC_INFORMATION_HEADER + name_len]
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        names.push(String::from_utf16_lossy(&units));
        index += 1;
    }
}
