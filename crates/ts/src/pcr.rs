/// PCR clock rate in Hz.
pub const PCR_HZ: u64 = 27_000_000;

/// Program Clock Reference — 33-bit base @ 90 kHz + 9-bit extension @ 27 MHz.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pcr {
    /// 33-bit base value at 90 kHz
    pub base: u64,
    /// 9-bit extension value at 27 MHz
    pub extension: u16,
}

impl Pcr {
    /// Parse PCR from exactly 6 bytes.
    ///
    /// Layout: `[base32..25][base24..17][base16..9][base8..1][base0 | reserved(6) | ext_high][ext_low]`
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < 6 {
            return None;
        }
        let base = ((data[0] as u64) << 25)
            | ((data[1] as u64) << 17)
            | ((data[2] as u64) << 9)
            | ((data[3] as u64) << 1)
            | ((data[4] as u64) >> 7);
        let extension = (((data[4] & 0x01) as u16) << 8) | data[5] as u16;
        Some(Pcr { base, extension })
    }

    /// Encode into exactly 6 bytes, reserved bits set to ones.
    pub fn encode(&self, out: &mut [u8]) {
        debug_assert!(out.len() >= 6);
        out[0] = (self.base >> 25) as u8;
        out[1] = (self.base >> 17) as u8;
        out[2] = (self.base >> 9) as u8;
        out[3] = (self.base >> 1) as u8;
        out[4] = (((self.base & 0x01) as u8) << 7) | 0x7e | (((self.extension >> 8) & 0x01) as u8);
        out[5] = self.extension as u8;
    }

    /// Split a full 27 MHz clock value into base and extension.
    pub fn from_27mhz(value: u64) -> Self {
        Pcr {
            base: value / 300,
            extension: (value % 300) as u16,
        }
    }

    /// Full PCR value at 27 MHz resolution.
    pub fn as_27mhz(&self) -> u64 {
        self.base * 300 + self.extension as u64
    }

    /// PCR as seconds (floating point).
    pub fn as_seconds(&self) -> f64 {
        self.as_27mhz() as f64 / PCR_HZ as f64
    }
}
