//! User intents behind the home and light views: toggling, dimming and
//! colouring single lights and whole zones.
//!
//! Every function returns the bridge's own error descriptions unchanged in
//! [`HueError::Api`](crate::HueError::Api), so they can be shown next to the
//! control that triggered them.

use crate::bridge::{Bridge, CommandLight};
use crate::color::XY;
use crate::resource::{Light, RType};
use crate::Result;

/// Flips a light's on state. Returns the new state.
pub async fn toggle_light(bridge: &Bridge, id: &str) -> Result<bool> {
    let light = bridge.light(id).await.single(RType::Light)?;
    let on = !light.on.on;
    bridge
        .update_light(id, &CommandLight::default().with_on(on))
        .await?
        .into_result()?;
    Ok(on)
}

/// Sets a light's brightness (percent), switching it on. The light is read
/// first, so an unknown id fails with the bridge's error and nothing is
/// written.
pub async fn set_light_brightness(bridge: &Bridge, id: &str, brightness: f32) -> Result<()> {
    bridge.light(id).await.single(RType::Light)?;
    let command = CommandLight::default().on().with_brightness(brightness);
    bridge.update_light(id, &command).await?.into_result()?;
    Ok(())
}

/// Flips a grouped light's on state, then waits for the lights to settle.
/// Returns the new state.
pub async fn toggle_group(bridge: &Bridge, gid: &str) -> Result<bool> {
    let group = bridge
        .grouped_light(gid)
        .await
        .single(RType::GroupedLight)?;
    let on = !group.on.on;
    bridge
        .update_grouped_light(gid, &CommandLight::default().with_on(on))
        .await?
        .into_result()?;
    settle(bridge).await;
    Ok(on)
}

/// Sets a grouped light's brightness (percent), switching it on, then waits
/// for the lights to settle.
pub async fn set_group_brightness(bridge: &Bridge, gid: &str, brightness: f32) -> Result<()> {
    let command = CommandLight::default().on().with_brightness(brightness);
    bridge
        .update_grouped_light(gid, &command)
        .await?
        .into_result()?;
    settle(bridge).await;
    Ok(())
}

/// Colours a light, fitted into its gamut when the light reports one, and
/// returns the chromaticity sent. Black has no chromaticity and switches the
/// light off instead.
pub async fn set_light_color(bridge: &Bridge, light: &Light, rgb: [u8; 3]) -> Result<Option<XY>> {
    let [r, g, b] = rgb;
    let xy = XY::from_rgb(r, g, b).map(|xy| match light.gamut() {
        Some(gamut) => gamut.closest(xy),
        None => xy,
    });
    let command = match xy {
        Some(xy) => CommandLight::default().on().with_xy(xy),
        None => CommandLight::default().off(),
    };
    bridge.update_light(&light.id, &command).await?.into_result()?;
    Ok(xy)
}

/// Physical lights lag behind a grouped write; reading back immediately
/// returns the old state.
async fn settle(bridge: &Bridge) {
    let delay = bridge.config().settle_delay;
    if !delay.is_zero() {
        log::debug!("waiting {delay:?} for lights to settle");
        tokio::time::sleep(delay).await;
    }
}
