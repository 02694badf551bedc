use crate::color::XY;
use crate::config::{BridgeConfig, TrustPolicy, HUE_ROOT_CA};
use crate::resource::{GroupedLight, Light, On, RType, ResourceIdentifier, Zone};
use crate::{HueError, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const APPLICATION_KEY_HEADER: &str = "hue-application-key";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandLightDimming {
    pub brightness: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandLightColorTemperature {
    pub mirek: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandLightColor {
    pub xy: XY,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CommandLightDynamics {
    #[serde(skip_serializing_if = "Option::is_none")]
    duration: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    speed: Option<f32>,
}

/// Partial state document for a PUT. Only the fields that are set are sent.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CommandLight {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on: Option<On>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimming: Option<CommandLightDimming>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_temperature: Option<CommandLightColorTemperature>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<CommandLightColor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dynamics: Option<CommandLightDynamics>,
}

impl CommandLight {
    pub fn on(self) -> Self {
        self.with_on(true)
    }

    pub fn off(self) -> Self {
        self.with_on(false)
    }

    pub fn with_on(self, on: bool) -> Self {
        Self {
            on: Some(On { on }),
            ..self
        }
    }

    pub fn with_brightness(self, brightness: f32) -> Self {
        Self {
            dimming: Some(CommandLightDimming { brightness }),
            ..self
        }
    }

    pub fn with_mirek(self, mirek: u16) -> Self {
        Self {
            color_temperature: Some(CommandLightColorTemperature { mirek }),
            ..self
        }
    }

    pub fn with_xy(self, xy: XY) -> Self {
        Self {
            color: Some(CommandLightColor { xy: xy.clamped() }),
            ..self
        }
    }

    pub fn with_transition_time(self, ms: u32) -> Self {
        Self {
            dynamics: Some(CommandLightDynamics {
                duration: Some(ms),
                ..Default::default()
            }),
            ..self
        }
    }
}

/// One entry of an envelope's `errors` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub description: Option<String>,
}

impl ApiError {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
        }
    }

    pub fn text(&self) -> &str {
        self.description.as_deref().unwrap_or("unknown bridge error")
    }
}

/// The `{ data, errors }` envelope every CLIP v2 call answers with. Both lists
/// may be non-empty at the same time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct HueResponse<T> {
    #[serde(default)]
    pub data: Vec<T>,
    #[serde(default)]
    pub errors: Vec<ApiError>,
}

impl<T> Default for HueResponse<T> {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            errors: Vec::new(),
        }
    }
}

impl<T> HueResponse<T> {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn error_descriptions(&self) -> Vec<String> {
        self.errors.iter().map(|e| e.text().to_string()).collect()
    }

    /// The data, or [`HueError::Api`] with the bridge's descriptions if the
    /// envelope carries any error.
    pub fn into_result(self) -> Result<Vec<T>> {
        if self.has_errors() {
            Err(HueError::Api {
                descriptions: self.error_descriptions(),
            })
        } else {
            Ok(self.data)
        }
    }

    /// Like [`HueResponse::into_result`] for calls that address one resource.
    pub fn into_single(self, rtype: RType) -> Result<T> {
        self.into_result()?
            .into_iter()
            .next()
            .ok_or(HueError::EmptyResult { rtype })
    }
}

/// Outcome of a read. Reads never fail loudly: rendering code always gets
/// a value, and can still tell "the bridge has nothing" (`Data` holding an
/// empty list) from "the bridge could not be asked" (`Failed`).
#[must_use]
#[derive(Debug)]
pub enum Fetched<T> {
    Data(T),
    Failed(HueError),
}

impl<T> Fetched<T> {
    pub fn is_failed(&self) -> bool {
        matches!(self, Fetched::Failed(_))
    }

    pub fn failure(&self) -> Option<&HueError> {
        match self {
            Fetched::Data(_) => None,
            Fetched::Failed(err) => Some(err),
        }
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            Fetched::Data(data) => Some(data),
            Fetched::Failed(_) => None,
        }
    }

    pub fn into_result(self) -> Result<T> {
        match self {
            Fetched::Data(data) => Ok(data),
            Fetched::Failed(err) => Err(err),
        }
    }
}

impl<T: Default> Fetched<T> {
    /// The fetched value, or the empty value if the fetch failed.
    pub fn into_data(self) -> T {
        match self {
            Fetched::Data(data) => data,
            Fetched::Failed(_) => T::default(),
        }
    }
}

impl<T> Fetched<HueResponse<T>> {
    /// The envelope as the bridge would have sent it. A failed fetch becomes
    /// an empty data list with one client-side error entry.
    pub fn into_response(self) -> HueResponse<T> {
        match self {
            Fetched::Data(response) => response,
            Fetched::Failed(err) => HueResponse {
                data: Vec::new(),
                errors: vec![ApiError::new(format!("Hue API error: {err}"))],
            },
        }
    }

    pub fn single(self, rtype: RType) -> Result<T> {
        self.into_result()?.into_single(rtype)
    }
}

/// Everything the home view needs, fetched in one go.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Home {
    pub lights: Vec<Light>,
    pub zones: Vec<Zone>,
    pub groups: Vec<GroupedLight>,
}

impl Home {
    pub fn is_empty(&self) -> bool {
        self.lights.is_empty() && self.zones.is_empty() && self.groups.is_empty()
    }

    pub fn zone_tree(&self) -> Vec<crate::aggregate::ZoneView<'_>> {
        crate::aggregate::build_zone_tree(&self.zones, &self.lights, &self.groups)
    }
}

/// Anything that can push a partial light state somewhere.
#[async_trait]
pub trait LightUpdater: Send + Sync {
    async fn update_light(
        &self,
        id: &str,
        command: &CommandLight,
    ) -> Result<HueResponse<ResourceIdentifier>>;
}

/// Client for one bridge. Holds only immutable configuration and a pooled
/// HTTP client, so clones are cheap and can be used from concurrent tasks.
#[derive(Debug, Clone)]
pub struct Bridge {
    config: BridgeConfig,
    base_url: String,
    client: reqwest::Client,
}

fn create_reqwest_client(config: &BridgeConfig) -> Result<reqwest::Client> {
    let mut key = HeaderValue::from_str(&config.application_key)?;
    key.set_sensitive(true);
    let mut headers = HeaderMap::new();
    headers.insert(HeaderName::from_static(APPLICATION_KEY_HEADER), key);

    let builder = reqwest::Client::builder()
        .default_headers(headers)
        .timeout(config.timeout)
        .connection_verbose(true)
        .tcp_keepalive(Some(Duration::from_secs(5)));

    let builder = match &config.trust {
        TrustPolicy::BridgeRootCa => builder
            .tls_built_in_root_certs(false)
            .add_root_certificate(certificate(HUE_ROOT_CA)?)
            .danger_accept_invalid_hostnames(true),
        TrustPolicy::PinnedCertificate(pem) => builder
            .tls_built_in_root_certs(false)
            .add_root_certificate(certificate(pem)?)
            .danger_accept_invalid_hostnames(true),
        TrustPolicy::AcceptSelfSigned => builder.danger_accept_invalid_certs(true),
    };

    builder
        .build()
        .map_err(|e| HueError::config_err(format!("cannot build HTTP client: {e}")))
}

fn certificate(pem: &[u8]) -> Result<reqwest::Certificate> {
    reqwest::Certificate::from_pem(pem)
        .map_err(|e| HueError::config_err(format!("invalid bridge certificate: {e}")))
}

impl Bridge {
    /// ### Example
    /// ```no_run
    /// let bridge = hue_home::Bridge::new(hue_home::BridgeConfig::new(
    ///     "192.168.1.110",
    ///     "rVV05G0i52vQMMLn6BK3dpr0F3uDiqtDjPLPK2uj",
    /// ))
    /// .unwrap();
    /// ```
    pub fn new(config: BridgeConfig) -> Result<Self> {
        Ok(Self {
            client: create_reqwest_client(&config)?,
            base_url: config.base_url(),
            config,
        })
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    fn url(&self, rtype: RType, id: Option<&str>) -> String {
        match id {
            Some(id) => format!("{}/resource/{}/{}", self.base_url, rtype, id),
            None => format!("{}/resource/{}", self.base_url, rtype),
        }
    }

    /// Sends the request and decodes the envelope. The bridge answers some
    /// failures (unknown id, bad value) with a non-2xx status and a regular
    /// envelope, so the status alone does not decide.
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<HueResponse<T>> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        log::debug!("response {} ({} bytes)", status, body.len());
        serde_json::from_slice(&body).map_err(|e| {
            HueError::protocol_err(status.as_u16(), format!("malformed envelope: {e}"))
        })
    }

    async fn get<T: DeserializeOwned>(&self, url: String) -> Fetched<HueResponse<T>> {
        log::debug!("GET {url}");
        match self.send::<T>(self.client.get(&url)).await {
            Ok(response) => {
                if response.has_errors() {
                    log::error!(
                        "Error from api {url}: {}",
                        response.error_descriptions().join(", ")
                    );
                }
                Fetched::Data(response)
            }
            Err(err) => {
                log::error!("Hue API error on {url}: {err}");
                Fetched::Failed(err)
            }
        }
    }

    /// GET `/resource/{rtype}`.
    pub async fn fetch_collection<T: DeserializeOwned>(
        &self,
        rtype: RType,
    ) -> Fetched<HueResponse<T>> {
        self.get(self.url(rtype, None)).await
    }

    /// GET `/resource/{rtype}/{id}`. The envelope holds zero or one item.
    pub async fn fetch_one<T: DeserializeOwned>(
        &self,
        rtype: RType,
        id: &str,
    ) -> Fetched<HueResponse<T>> {
        self.get(self.url(rtype, Some(id))).await
    }

    /// PUT a partial state to `/resource/{rtype}/{id}`.
    ///
    /// Unlike the reads, a transport or protocol failure is returned as an
    /// error: the caller cannot assume the light changed. A well-formed
    /// envelope is returned as is, including any errors the bridge put in
    /// it; see [`HueResponse::into_result`].
    pub async fn update<B>(
        &self,
        rtype: RType,
        id: &str,
        body: &B,
    ) -> Result<HueResponse<ResourceIdentifier>>
    where
        B: Serialize + std::fmt::Debug + ?Sized,
    {
        let url = self.url(rtype, Some(id));
        log::debug!("PUT {url} {body:?}");

        let request = self.client.put(&url).json(body);
        let response = self.send::<ResourceIdentifier>(request).await.map_err(|err| {
            log::error!("Hue API error on {url}: {err}");
            err
        })?;

        if response.has_errors() || response.data.is_empty() {
            log::error!(
                "Error updating {rtype} {id}: {}",
                response.error_descriptions().join(", ")
            );
        }
        Ok(response)
    }

    /// Fetches lights, zones and grouped lights concurrently. If any of the
    /// three requests fails, or the bridge reports an error for any of them,
    /// the whole result fails: a view never gets lights without the zones
    /// they belong to.
    pub async fn fetch_home(&self) -> Fetched<Home> {
        log::info!("Get home");
        let (lights, zones, groups) = futures::join!(
            self.fetch_collection::<Light>(RType::Light),
            self.fetch_collection::<Zone>(RType::Zone),
            self.fetch_collection::<GroupedLight>(RType::GroupedLight),
        );

        match all_fetched(lights, zones, groups) {
            Ok((lights, zones, groups)) => {
                log::info!(
                    "home has {} lights, {} zones, {} grouped lights",
                    lights.len(),
                    zones.len(),
                    groups.len()
                );
                Fetched::Data(Home {
                    lights,
                    zones,
                    groups,
                })
            }
            Err(err) => {
                log::error!("get home data failed: {err}");
                Fetched::Failed(err)
            }
        }
    }

    pub async fn lights(&self) -> Fetched<HueResponse<Light>> {
        self.fetch_collection(RType::Light).await
    }

    pub async fn zones(&self) -> Fetched<HueResponse<Zone>> {
        self.fetch_collection(RType::Zone).await
    }

    pub async fn grouped_lights(&self) -> Fetched<HueResponse<GroupedLight>> {
        self.fetch_collection(RType::GroupedLight).await
    }

    pub async fn light(&self, id: &str) -> Fetched<HueResponse<Light>> {
        self.fetch_one(RType::Light, id).await
    }

    pub async fn grouped_light(&self, id: &str) -> Fetched<HueResponse<GroupedLight>> {
        self.fetch_one(RType::GroupedLight, id).await
    }

    /// ### Example
    /// ```no_run
    /// # tokio_test::block_on(async {
    /// use hue_home::{Bridge, BridgeConfig, CommandLight};
    ///
    /// let bridge = Bridge::new(BridgeConfig::from_env().unwrap()).unwrap();
    /// let command = CommandLight::default().on().with_brightness(40.0);
    /// bridge
    ///     .update_light("3f6d2c1e-0001", &command)
    ///     .await
    ///     .unwrap()
    ///     .into_result()
    ///     .unwrap();
    /// # })
    /// ```
    pub async fn update_light(
        &self,
        id: &str,
        command: &CommandLight,
    ) -> Result<HueResponse<ResourceIdentifier>> {
        self.update(RType::Light, id, command).await
    }

    pub async fn update_grouped_light(
        &self,
        id: &str,
        command: &CommandLight,
    ) -> Result<HueResponse<ResourceIdentifier>> {
        self.update(RType::GroupedLight, id, command).await
    }
}

/// Unwraps the three envelopes, failing on the first transport or protocol
/// failure. Bridge-reported errors of all three are collected into one
/// [`HueError::Api`].
fn all_fetched<A, B, C>(
    a: Fetched<HueResponse<A>>,
    b: Fetched<HueResponse<B>>,
    c: Fetched<HueResponse<C>>,
) -> Result<(Vec<A>, Vec<B>, Vec<C>)> {
    let (a, b, c) = (a.into_result()?, b.into_result()?, c.into_result()?);
    let descriptions: Vec<String> = [
        a.error_descriptions(),
        b.error_descriptions(),
        c.error_descriptions(),
    ]
    .concat();
    if !descriptions.is_empty() {
        return Err(HueError::Api { descriptions });
    }
    Ok((a.data, b.data, c.data))
}

#[async_trait]
impl LightUpdater for Bridge {
    async fn update_light(
        &self,
        id: &str,
        command: &CommandLight,
    ) -> Result<HueResponse<ResourceIdentifier>> {
        self.update(RType::Light, id, command).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn command_serializes_only_set_fields() {
        let command = CommandLight::default().on().with_brightness(40.0);
        assert_eq!(
            serde_json::to_value(&command).unwrap(),
            json!({ "on": { "on": true }, "dimming": { "brightness": 40.0 } })
        );
        assert_eq!(serde_json::to_value(CommandLight::default()).unwrap(), json!({}));
    }

    #[test]
    fn command_with_temperature_and_transition() {
        let command = CommandLight::default().with_mirek(366).with_transition_time(400);
        assert_eq!(
            serde_json::to_value(&command).unwrap(),
            json!({ "color_temperature": { "mirek": 366 }, "dynamics": { "duration": 400 } })
        );
    }

    #[test]
    fn command_clamps_xy() {
        let command = CommandLight::default().with_xy(XY::new(0.9, 0.9));
        let xy = command.color.unwrap().xy;
        assert!(xy.x + xy.y <= 1.0);
    }

    #[test]
    fn envelope_with_data_and_errors() {
        let response: HueResponse<ResourceIdentifier> = serde_json::from_value(json!({
            "data": [{ "rid": "abc", "rtype": "light" }],
            "errors": [{ "description": "brightness out of range" }]
        }))
        .unwrap();
        assert_eq!(response.data.len(), 1);
        match response.into_result() {
            Err(HueError::Api { descriptions }) => {
                assert_eq!(descriptions, vec!["brightness out of range".to_string()]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn envelope_lists_default_to_empty() {
        let response: HueResponse<Light> = serde_json::from_str("{}").unwrap();
        assert_eq!(response, HueResponse::default());
        assert!(matches!(
            response.into_single(RType::Light),
            Err(HueError::EmptyResult { rtype: RType::Light })
        ));
    }

    fn decode<T: DeserializeOwned>(body: &[u8]) -> HueResponse<T> {
        serde_json::from_slice(body).unwrap()
    }

    #[test]
    fn envelope_decodes_for_types_without_default() {
        let ids: HueResponse<ResourceIdentifier> = decode(br#"{ "errors": [] }"#);
        assert!(ids.data.is_empty());

        let zones: HueResponse<Zone> =
            decode(br#"{ "data": [{ "id": "z", "type": "zone", "children": [] }] }"#);
        assert_eq!(zones.data[0].id, "z");
        assert!(zones.errors.is_empty());
    }

    #[test]
    fn null_description_is_kept_readable() {
        let response: HueResponse<Light> =
            serde_json::from_value(json!({ "data": [], "errors": [{ "description": null }] }))
                .unwrap();
        assert_eq!(response.error_descriptions(), vec!["unknown bridge error"]);
    }

    #[test]
    fn failed_fetch_becomes_synthetic_envelope() {
        let fetched: Fetched<HueResponse<Light>> =
            Fetched::Failed(HueError::protocol_err(502, "bad gateway"));
        assert!(fetched.is_failed());
        let response = fetched.into_response();
        assert!(response.data.is_empty());
        assert_eq!(response.errors.len(), 1);
        assert!(response.errors[0].text().starts_with("Hue API error"));
    }

    #[test]
    fn failed_home_is_empty() {
        let fetched: Fetched<Home> = Fetched::Failed(HueError::protocol_err(500, "boom"));
        assert!(fetched.failure().is_some());
        assert!(fetched.into_data().is_empty());
    }

    #[test]
    fn client_rejects_bad_application_key() {
        let err = Bridge::new(BridgeConfig::new("bridge", "bad\nkey")).unwrap_err();
        assert!(matches!(err, HueError::InvalidHeader(_)));
    }
}
