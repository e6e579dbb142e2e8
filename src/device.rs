//! Virtual network interface setup.
//!
//! The tunnel captures and delivers raw IP packets through a TUN
//! device. The device is opened in packet mode without the
//! packet-information prefix, so every read is exactly one IP packet
//! and every write injects exactly one.

use std::net::Ipv4Addr;

use tracing::debug;
use tun::AsyncDevice;

use crate::config::DEFAULT_MAX_PACKET_SIZE;
use crate::error::Result;

/// Parameters for the local interface.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Interface name to request; the platform picks one when `None`.
    pub name: Option<String>,
    /// Address assigned to the interface.
    pub address: Ipv4Addr,
    /// Netmask of the tunnel subnet.
    pub netmask: Ipv4Addr,
    /// Point-to-point peer address, if any.
    pub destination: Option<Ipv4Addr>,
    /// Interface MTU. Must not exceed the tunnel's maximum packet size
    /// or captured packets will be rejected at admission.
    pub mtu: u16,
}

impl DeviceConfig {
    pub fn new(address: Ipv4Addr, netmask: Ipv4Addr) -> Self {
        Self {
            name: None,
            address,
            netmask,
            destination: None,
            mtu: DEFAULT_MAX_PACKET_SIZE as u16,
        }
    }
}

/// Open and bring up the TUN device.
///
/// # Errors
///
/// `Device` when the platform refuses, typically for missing
/// privileges or a name collision.
pub fn open_device(config: &DeviceConfig) -> Result<AsyncDevice> {
    let mut tun_config = tun::Configuration::default();
    tun_config
        .address(config.address)
        .netmask(config.netmask)
        .mtu(config.mtu as i32)
        .up();

    if let Some(name) = &config.name {
        tun_config.name(name);
    }
    if let Some(destination) = config.destination {
        tun_config.destination(destination);
    }

    // Bare IP packets only, no packet-information prefix.
    #[cfg(target_os = "linux")]
    tun_config.platform(|platform| {
        platform.packet_information(false);
    });

    debug!(
        name = config.name.as_deref().unwrap_or("<auto>"),
        address = %config.address,
        netmask = %config.netmask,
        mtu = config.mtu,
        "opening interface"
    );

    Ok(tun::create_as_async(&tun_config)?)
}
