//! Device configuration
//!
//! Everything here is `const` so the descriptor tree built from it can live
//! in a `static`.

/// Class code declared in the device descriptor
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceClass {
    /// Vendor specific (0xFF). Operating systems that bind drivers by device
    /// class leave the device alone; interface-matching drivers still see the
    /// CDC interfaces.
    Vendor,
    /// Communications device (0x02), so hosts bind their CDC driver to the
    /// whole device.
    Communications,
    /// Class information is only given at the interface level (0x00).
    PerInterface,
}

impl DeviceClass {
    /// Returns the `bDeviceClass` byte
    pub const fn byte(self) -> u8 {
        match self {
            DeviceClass::Vendor => 0xFF,
            DeviceClass::Communications => 0x02,
            DeviceClass::PerInterface => 0x00,
        }
    }
}

/// How class requests sent to the communications interface are answered
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlPolicy {
    /// Serve `SET_LINE_CODING`, `GET_LINE_CODING` and `SET_CONTROL_LINE_STATE`
    /// and pass everything else on. The ACM descriptor advertises line coding
    /// support.
    AcmRequests,
    /// Claim every request without looking at it. The ACM descriptor
    /// advertises no capabilities.
    ClaimAll,
}

/// Device configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    pub(crate) vendor_id: u16,
    pub(crate) product_id: u16,
    pub(crate) device_release: u16,
    pub(crate) device_class: DeviceClass,
    pub(crate) max_power_ma: u16,
    pub(crate) self_powered: bool,
    pub(crate) control: ControlPolicy,
}

impl Config {
    /// Vendor and product ID 0x1AD4:0xB000, release 1.00, vendor-specific
    /// device class, bus powered at 100 mA, line coding requests served
    pub const DEFAULT: Config = Config {
        vendor_id: 0x1AD4,
        product_id: 0xB000,
        device_release: 0x0100,
        device_class: DeviceClass::Vendor,
        max_power_ma: 100,
        self_powered: false,
        control: ControlPolicy::AcmRequests,
    };

    /// Sets the vendor and product IDs
    pub const fn vid_pid(mut self, vendor_id: u16, product_id: u16) -> Self {
        self.vendor_id = vendor_id;
        self.product_id = product_id;
        self
    }

    /// Sets the BCD encoded device release number
    pub const fn device_release(mut self, bcd: u16) -> Self {
        self.device_release = bcd;
        self
    }

    /// Sets the class declared in the device descriptor
    pub const fn device_class(mut self, class: DeviceClass) -> Self {
        self.device_class = class;
        self
    }

    /// Sets the maximum bus current in milliamps, clamped to the 500 mA USB 2.0 limit
    pub const fn max_power(mut self, milliamps: u16) -> Self {
        self.max_power_ma = if milliamps > 500 { 500 } else { milliamps };
        self
    }

    /// Declares the device as self powered
    pub const fn self_powered(mut self, self_powered: bool) -> Self {
        self.self_powered = self_powered;
        self
    }

    /// Sets how class requests are answered
    pub const fn control_requests(mut self, policy: ControlPolicy) -> Self {
        self.control = policy;
        self
    }

    /// Returns the `bMaxPower` value (2 mA units)
    pub(crate) const fn max_power_units(&self) -> u8 {
        ((self.max_power_ma + 1) / 2) as u8
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.vendor_id, 0x1AD4);
        assert_eq!(config.product_id, 0xB000);
        assert_eq!(config.device_class.byte(), 0xFF);
        assert_eq!(config.max_power_units(), 50);
    }

    #[test]
    fn builder() {
        const CONFIG: Config = Config::DEFAULT
            .vid_pid(0x16C0, 0x27DD)
            .device_class(DeviceClass::Communications)
            .max_power(900)
            .control_requests(ControlPolicy::ClaimAll);

        assert_eq!((CONFIG.vendor_id, CONFIG.product_id), (0x16C0, 0x27DD));
        assert_eq!(CONFIG.device_class.byte(), 0x02);
        assert_eq!(CONFIG.max_power_units(), 250);
        assert_eq!(CONFIG.control, ControlPolicy::ClaimAll);
    }
}
