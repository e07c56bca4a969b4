//! Individual light control.

use std::net::Ipv4Addr;
use std::ops::Deref;

use futures::future::BoxFuture;
use log::debug;

use crate::device::{Device, join_all_bounded};
use crate::errors::Error;
use crate::message::{MessageKind, Request, ResponsePayload, Waveform};
use crate::types::{ColorPower, Hsbk, MacAddress, PowerLevel};

type Result<T> = std::result::Result<T, Error>;

/// A light-capable LIFX device.
///
/// `Light` wraps [`Device`], so everything a device can do a light can do,
/// and adds color, waveform, and infrared control. Cloning is cheap and
/// clones share the same state cache.
///
/// # Example
///
/// ```no_run
/// use lifx_lan_rs::{Light, colors};
///
/// # async fn run() -> Result<(), lifx_lan_rs::Error> {
/// let light = Light::new("d0:73:d5:01:02:03".parse()?, None);
/// light.set_color(colors::WARM_WHITE, 500, false).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Light {
    device: Device,
}

impl Deref for Light {
    type Target = Device;

    fn deref(&self) -> &Device {
        &self.device
    }
}

impl Light {
    /// Combined color+power sets get their own small pool.
    const COMBINED_POOL_SIZE: usize = 2;

    pub fn new(mac_addr: MacAddress, ip_addr: Option<Ipv4Addr>) -> Self {
        Light {
            device: Device::new(mac_addr, ip_addr),
        }
    }

    /// Wrap an already-configured device.
    pub fn from_device(device: Device) -> Self {
        Light { device }
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Refresh every cached field, color included.
    ///
    /// Same contract as [`Device::refresh`]: `Ok(false)` when any field got
    /// no response, with successful fields keeping their updates.
    pub async fn refresh(&self) -> Result<bool> {
        let mut ops = self.device.refresh_ops();
        let light = self.clone();
        let color_op: BoxFuture<'static, Result<()>> =
            Box::pin(async move { light.refresh_color().await });
        ops.push(color_op);
        let results = join_all_bounded(ops, Device::REFRESH_POOL_SIZE).await;
        self.device.finish_refresh(results)
    }

    /// Query the light's color, caching color, power, and label from the
    /// combined state reply.
    pub async fn get_color(&self) -> Result<Hsbk> {
        let response = self
            .req_with_resp(Request::LightGet, &[MessageKind::LightState])
            .await?;
        match response.payload {
            ResponsePayload::LightState {
                color,
                power,
                label,
            } => {
                let mut state = self.state_handle().lock().await;
                state.color = Some(color);
                state.power_level = Some(PowerLevel::from_wire(power));
                state.label = Some(label);
                Ok(color)
            }
            other => Err(Error::decode(format!("unexpected payload {other:?}"))),
        }
    }

    pub(crate) async fn refresh_color(&self) -> Result<()> {
        self.get_color().await?;
        Ok(())
    }

    /// Query the light's power level, updating the cache.
    pub async fn get_power(&self) -> Result<PowerLevel> {
        let response = self
            .req_with_resp(Request::LightGetPower, &[MessageKind::LightStatePower])
            .await?;
        match response.payload {
            ResponsePayload::LightStatePower { level } => {
                let power = PowerLevel::from_wire(level);
                self.state_handle().lock().await.power_level = Some(power);
                Ok(power)
            }
            other => Err(Error::decode(format!("unexpected payload {other:?}"))),
        }
    }

    /// Turn the light on or off, fading over `duration_ms`.
    ///
    /// Shares the [`Device::set_power`] idempotence guard: a value equal to
    /// the cached one sends nothing.
    pub async fn set_power(&self, power: PowerLevel, duration_ms: u32, rapid: bool) -> Result<()> {
        self.apply_power(
            power,
            rapid,
            Request::LightSetPower {
                level: power,
                duration_ms,
            },
        )
        .await
    }

    /// Set the light's color, fading over `duration_ms`.
    pub async fn set_color(&self, color: Hsbk, duration_ms: u32, rapid: bool) -> Result<()> {
        debug!("{}: setting color to {color:?}", self.mac_addr());
        self.send_set_message(Request::LightSetColor { color, duration_ms }, rapid)
            .await
    }

    /// Run a waveform animation on the light.
    #[allow(clippy::too_many_arguments)]
    pub async fn set_waveform(
        &self,
        transient: bool,
        color: Hsbk,
        period_ms: u32,
        cycles: f32,
        duty_cycle: i16,
        waveform: Waveform,
        rapid: bool,
    ) -> Result<()> {
        self.send_set_message(
            Request::LightSetWaveform {
                transient,
                color,
                period_ms,
                cycles,
                duty_cycle,
                waveform,
            },
            rapid,
        )
        .await
    }

    /// Apply a color and power state together on the dedicated pool.
    ///
    /// The color is only sent when the target power is on.
    pub async fn set_color_power(
        &self,
        cp: ColorPower,
        duration_ms: u32,
        rapid: bool,
    ) -> Result<()> {
        let mut ops: Vec<BoxFuture<'static, Result<()>>> = Vec::with_capacity(2);
        if cp.power == PowerLevel::On
            && let Some(color) = cp.color
        {
            let light = self.clone();
            ops.push(Box::pin(async move {
                light.set_color(color, duration_ms, rapid).await
            }));
        }
        let light = self.clone();
        ops.push(Box::pin(async move {
            light.set_power(cp.power, duration_ms, rapid).await
        }));

        for result in join_all_bounded(ops, Self::COMBINED_POOL_SIZE).await {
            result?;
        }
        Ok(())
    }

    /// Set only the hue, reading the current color first.
    pub async fn set_hue(&self, hue: u16, duration_ms: u32, rapid: bool) -> Result<()> {
        let color = self.get_color().await?;
        self.set_color(Hsbk { hue, ..color }, duration_ms, rapid)
            .await
    }

    /// Set only the saturation, reading the current color first.
    pub async fn set_saturation(&self, saturation: u16, duration_ms: u32, rapid: bool) -> Result<()> {
        let color = self.get_color().await?;
        self.set_color(Hsbk { saturation, ..color }, duration_ms, rapid)
            .await
    }

    /// Set only the brightness, reading the current color first.
    pub async fn set_brightness(&self, brightness: u16, duration_ms: u32, rapid: bool) -> Result<()> {
        let color = self.get_color().await?;
        self.set_color(Hsbk { brightness, ..color }, duration_ms, rapid)
            .await
    }

    /// Set only the color temperature, reading the current color first.
    pub async fn set_kelvin(&self, kelvin: u16, duration_ms: u32, rapid: bool) -> Result<()> {
        let color = self.get_color().await?;
        self.set_color(Hsbk { kelvin, ..color }, duration_ms, rapid)
            .await
    }

    /// Infrared maximum brightness, if the light supports infrared.
    pub async fn get_infrared(&self) -> Result<Option<u16>> {
        if !self.supports_infrared().await? {
            return Ok(None);
        }
        let response = self
            .req_with_resp(Request::LightGetInfrared, &[MessageKind::LightStateInfrared])
            .await?;
        match response.payload {
            ResponsePayload::LightStateInfrared { brightness } => {
                self.state_handle().lock().await.infrared_brightness = Some(brightness);
                Ok(Some(brightness))
            }
            other => Err(Error::decode(format!("unexpected payload {other:?}"))),
        }
    }

    /// Set the infrared maximum brightness.
    pub async fn set_infrared(&self, brightness: u16, rapid: bool) -> Result<()> {
        self.send_set_message(Request::LightSetInfrared { brightness }, rapid)
            .await
    }

    /// Lowest color temperature this light supports.
    pub async fn min_kelvin(&self) -> Result<u16> {
        Ok(self.features().await?.min_kelvin)
    }

    /// Highest color temperature this light supports.
    pub async fn max_kelvin(&self) -> Result<u16> {
        Ok(self.features().await?.max_kelvin)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::message::Response;
    use crate::transport::fake::FakeTransport;

    const SOURCE: u32 = 0x600dcafe;

    fn mac() -> MacAddress {
        "d0:73:d5:11:22:33".parse().unwrap()
    }

    fn test_light(transport: &FakeTransport) -> Light {
        Light::from_device(
            Device::new(mac(), None)
                .with_source_id(SOURCE)
                .with_transport(transport.handle())
                .with_timeout(Duration::from_millis(25))
                .with_max_attempts(2),
        )
    }

    fn respond(transport: &FakeTransport, request: MessageKind, kind: MessageKind, payload: ResponsePayload) {
        transport.respond_to(
            request,
            Response {
                kind,
                source_id: SOURCE,
                target: mac(),
                payload,
            },
        );
    }

    fn script_light_state(transport: &FakeTransport, color: Hsbk, power: u16) {
        respond(
            transport,
            MessageKind::LightGet,
            MessageKind::LightState,
            ResponsePayload::LightState {
                color,
                power,
                label: "Lamp".into(),
            },
        );
    }

    #[tokio::test]
    async fn test_get_color_caches_color_power_and_label() {
        let transport = FakeTransport::new();
        let color = Hsbk::new(100, 200, 300, 3500);
        script_light_state(&transport, color, 65535);
        let light = test_light(&transport);

        assert_eq!(light.get_color().await.unwrap(), color);

        let state = light.state().await;
        assert_eq!(state.color, Some(color));
        assert_eq!(state.power_level, Some(PowerLevel::On));
        assert_eq!(state.label.as_deref(), Some("Lamp"));
    }

    #[tokio::test]
    async fn test_set_hue_replaces_only_hue() {
        let transport = FakeTransport::new();
        script_light_state(&transport, Hsbk::new(0, 500, 600, 2700), 65535);
        respond(
            &transport,
            MessageKind::LightSetColor,
            MessageKind::Acknowledgement,
            ResponsePayload::Acknowledgement,
        );
        let light = test_light(&transport);

        light.set_hue(12000, 0, false).await.unwrap();

        let frames = transport.sent_frames();
        let set_color = frames
            .iter()
            .find(|f| u16::from_le_bytes([f[32], f[33]]) == MessageKind::LightSetColor.code())
            .expect("color set frame");
        // payload: reserved u8, then hue/saturation at 37.. and 39..
        assert_eq!(u16::from_le_bytes([set_color[37], set_color[38]]), 12000);
        assert_eq!(u16::from_le_bytes([set_color[39], set_color[40]]), 500);
    }

    #[tokio::test]
    async fn test_light_set_power_is_idempotent() {
        let transport = FakeTransport::new();
        respond(
            &transport,
            MessageKind::LightSetPower,
            MessageKind::Acknowledgement,
            ResponsePayload::Acknowledgement,
        );
        let light = test_light(&transport);

        light.set_power(PowerLevel::On, 0, false).await.unwrap();
        let sends = transport.sent_count();
        light.set_power(PowerLevel::On, 0, false).await.unwrap();
        assert_eq!(transport.sent_count(), sends);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_set_color_power_sends_both_when_turning_on() {
        let transport = FakeTransport::new();
        respond(
            &transport,
            MessageKind::LightSetColor,
            MessageKind::Acknowledgement,
            ResponsePayload::Acknowledgement,
        );
        respond(
            &transport,
            MessageKind::LightSetPower,
            MessageKind::Acknowledgement,
            ResponsePayload::Acknowledgement,
        );
        let light = test_light(&transport);

        light
            .set_color_power(
                ColorPower {
                    color: Some(crate::types::colors::BLUE),
                    power: PowerLevel::On,
                },
                0,
                false,
            )
            .await
            .unwrap();

        assert_eq!(transport.sent_count(), 2);
        assert_eq!(light.state().await.power_level, Some(PowerLevel::On));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_set_color_power_skips_color_when_turning_off() {
        let transport = FakeTransport::new();
        respond(
            &transport,
            MessageKind::LightSetPower,
            MessageKind::Acknowledgement,
            ResponsePayload::Acknowledgement,
        );
        let light = test_light(&transport);

        light
            .set_color_power(
                ColorPower {
                    color: Some(crate::types::colors::RED),
                    power: PowerLevel::Off,
                },
                0,
                false,
            )
            .await
            .unwrap();

        // only the power set went out
        assert_eq!(transport.sent_count(), 1);
    }

    #[tokio::test]
    async fn test_get_infrared_checks_support_first() {
        let transport = FakeTransport::new();
        respond(
            &transport,
            MessageKind::GetVersion,
            MessageKind::StateVersion,
            ResponsePayload::StateVersion {
                vendor: 1,
                product: 59, // Mini Color: no infrared
                version: 0,
            },
        );
        let light = test_light(&transport);

        assert_eq!(light.get_infrared().await.unwrap(), None);
        // the infrared query itself was never sent
        let sent = transport.sent_count();
        assert_eq!(sent, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_light_refresh_includes_color() {
        let transport = FakeTransport::new();
        let color = Hsbk::new(9, 8, 7, 3500);
        script_light_state(&transport, color, 0);
        for (request, kind, payload) in [
            (
                MessageKind::GetLabel,
                MessageKind::StateLabel,
                ResponsePayload::StateLabel {
                    label: "Lamp".into(),
                },
            ),
            (
                MessageKind::GetLocation,
                MessageKind::StateLocation,
                ResponsePayload::StateLocation {
                    location: [0; 16],
                    label: "Hall".into(),
                    updated_at: 0,
                },
            ),
            (
                MessageKind::GetGroup,
                MessageKind::StateGroup,
                ResponsePayload::StateGroup {
                    group: [0; 16],
                    label: "Ground".into(),
                    updated_at: 0,
                },
            ),
            (
                MessageKind::GetPower,
                MessageKind::StatePower,
                ResponsePayload::StatePower { level: 0 },
            ),
            (
                MessageKind::GetHostFirmware,
                MessageKind::StateHostFirmware,
                ResponsePayload::StateHostFirmware {
                    build_timestamp: 0,
                    version: 2 << 16,
                },
            ),
            (
                MessageKind::GetWifiFirmware,
                MessageKind::StateWifiFirmware,
                ResponsePayload::StateWifiFirmware {
                    build_timestamp: 0,
                    version: 1 << 16,
                },
            ),
            (
                MessageKind::GetVersion,
                MessageKind::StateVersion,
                ResponsePayload::StateVersion {
                    vendor: 1,
                    product: 22,
                    version: 0,
                },
            ),
        ] {
            respond(&transport, request, kind, payload);
        }
        let light = test_light(&transport);

        assert_eq!(light.refresh().await.unwrap(), true);
        let state = light.state().await;
        assert_eq!(state.color, Some(color));
        assert_eq!(state.power_level, Some(PowerLevel::Off));
        assert_eq!(state.location.as_deref(), Some("Hall"));
    }
}
