//! HTTP/2 SETTINGS values.
//!
//! Used for the local settings a connection is opened with and for the
//! remote settings a multiplexed connection relays whenever the peer changes
//! them.

/// Identifier of a single SETTINGS parameter (RFC 7540 Section 6.5.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingId {
    HeaderTableSize,
    EnablePush,
    MaxConcurrentStreams,
    InitialWindowSize,
    MaxFrameSize,
    MaxHeaderListSize,
    Unknown(u16),
}

impl From<u16> for SettingId {
    fn from(code: u16) -> Self {
        match code {
            0x1 => SettingId::HeaderTableSize,
            0x2 => SettingId::EnablePush,
            0x3 => SettingId::MaxConcurrentStreams,
            0x4 => SettingId::InitialWindowSize,
            0x5 => SettingId::MaxFrameSize,
            0x6 => SettingId::MaxHeaderListSize,
            other => SettingId::Unknown(other),
        }
    }
}

impl From<SettingId> for u16 {
    fn from(id: SettingId) -> Self {
        match id {
            SettingId::HeaderTableSize => 0x1,
            SettingId::EnablePush => 0x2,
            SettingId::MaxConcurrentStreams => 0x3,
            SettingId::InitialWindowSize => 0x4,
            SettingId::MaxFrameSize => 0x5,
            SettingId::MaxHeaderListSize => 0x6,
            SettingId::Unknown(code) => code,
        }
    }
}

/// One (identifier, value) pair as carried in a SETTINGS frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Setting {
    pub id: SettingId,
    pub value: u32,
}

impl Setting {
    pub fn new(id: impl Into<SettingId>, value: u32) -> Self {
        Self {
            id: id.into(),
            value,
        }
    }
}

/// HTTP/2 SETTINGS snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct H2Settings {
    /// SETTINGS_HEADER_TABLE_SIZE (0x1) - HPACK dynamic table size
    pub header_table_size: u32,
    /// SETTINGS_ENABLE_PUSH (0x2) - Server push enabled
    pub enable_push: bool,
    /// SETTINGS_MAX_CONCURRENT_STREAMS (0x3)
    pub max_concurrent_streams: u32,
    /// SETTINGS_INITIAL_WINDOW_SIZE (0x4) - Flow control window
    pub initial_window_size: u32,
    /// SETTINGS_MAX_FRAME_SIZE (0x5) - Maximum frame payload
    pub max_frame_size: u32,
    /// SETTINGS_MAX_HEADER_LIST_SIZE (0x6) - Maximum header block size
    pub max_header_list_size: u32,
}

impl Default for H2Settings {
    /// RFC 7540 initial values; "unlimited" is `u32::MAX`.
    fn default() -> Self {
        Self {
            header_table_size: 4096,
            enable_push: true,
            max_concurrent_streams: u32::MAX,
            initial_window_size: 65535,
            max_frame_size: 16384,
            max_header_list_size: u32::MAX,
        }
    }
}

impl H2Settings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initial_window_size(mut self, size: u32) -> Self {
        self.initial_window_size = size;
        self
    }

    pub fn max_frame_size(mut self, size: u32) -> Self {
        self.max_frame_size = size;
        self
    }

    pub fn max_concurrent_streams(mut self, max: u32) -> Self {
        self.max_concurrent_streams = max;
        self
    }

    pub fn enable_push(mut self, enable: bool) -> Self {
        self.enable_push = enable;
        self
    }

    /// Fold a SETTINGS frame into this snapshot. Unknown identifiers are
    /// ignored, as RFC 7540 requires.
    pub fn apply(&mut self, settings: &[Setting]) {
        for setting in settings {
            match setting.id {
                SettingId::HeaderTableSize => self.header_table_size = setting.value,
                SettingId::EnablePush => self.enable_push = setting.value != 0,
                SettingId::MaxConcurrentStreams => self.max_concurrent_streams = setting.value,
                SettingId::InitialWindowSize => self.initial_window_size = setting.value,
                SettingId::MaxFrameSize => self.max_frame_size = setting.value,
                SettingId::MaxHeaderListSize => self.max_header_list_size = setting.value,
                SettingId::Unknown(_) => {}
            }
        }
    }

    /// The pairs that differ from RFC defaults, in identifier order.
    pub fn to_settings(&self) -> Vec<Setting> {
        let defaults = Self::default();
        let candidates = [
            (SettingId::HeaderTableSize, self.header_table_size, defaults.header_table_size),
            (
                SettingId::EnablePush,
                u32::from(self.enable_push),
                u32::from(defaults.enable_push),
            ),
            (
                SettingId::MaxConcurrentStreams,
                self.max_concurrent_streams,
                defaults.max_concurrent_streams,
            ),
            (
                SettingId::InitialWindowSize,
                self.initial_window_size,
                defaults.initial_window_size,
            ),
            (SettingId::MaxFrameSize, self.max_frame_size, defaults.max_frame_size),
            (
                SettingId::MaxHeaderListSize,
                self.max_header_list_size,
                defaults.max_header_list_size,
            ),
        ];
        candidates
            .into_iter()
            .filter(|(_, value, default)| value != default)
            .map(|(id, value, _)| Setting { id, value })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rfc_defaults() {
        let settings = H2Settings::default();
        assert_eq!(settings.header_table_size, 4096);
        assert!(settings.enable_push);
        assert_eq!(settings.initial_window_size, 65535);
        assert_eq!(settings.max_frame_size, 16384);
        assert!(settings.to_settings().is_empty());
    }

    #[test]
    fn test_apply_remote_frame() {
        let mut settings = H2Settings::default();
        settings.apply(&[
            Setting::new(0x3u16, 100),
            Setting::new(SettingId::EnablePush, 0),
            Setting::new(0x99u16, 7),
        ]);
        assert_eq!(settings.max_concurrent_streams, 100);
        assert!(!settings.enable_push);
        assert_eq!(settings.header_table_size, 4096);
    }

    #[test]
    fn test_to_settings_lists_changes() {
        let settings = H2Settings::new()
            .initial_window_size(6291456)
            .enable_push(false);
        let pairs = settings.to_settings();
        assert_eq!(
            pairs,
            vec![
                Setting::new(SettingId::EnablePush, 0),
                Setting::new(SettingId::InitialWindowSize, 6291456),
            ]
        );
    }

    #[test]
    fn test_setting_id_codes() {
        assert_eq!(SettingId::from(0x4), SettingId::InitialWindowSize);
        assert_eq!(u16::from(SettingId::MaxHeaderListSize), 0x6);
        assert_eq!(u16::from(SettingId::Unknown(0x20)), 0x20);
    }

    #[test]
    fn test_settings_are_copy() {
        let s1 = H2Settings::default();
        let s2 = s1;
        assert_eq!(s1, s2);
    }
}
