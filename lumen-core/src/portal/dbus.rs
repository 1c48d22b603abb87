//! xdg-desktop-portal screencast over zbus
//!
//! Each request subscribes to `Response` on its predicted request object path
//! before the method call goes out, so a fast reply can never be missed, and
//! the subscription is dropped after the first signal.

use std::collections::HashMap;
use std::future::Future;
use std::os::fd::OwnedFd;

use futures_util::StreamExt;
use gst::glib;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};
use zbus::proxy::CacheProperties;
use zbus::zvariant::{DeserializeDict, ObjectPath, OwnedObjectPath, OwnedValue, Type, Value};
use zbus::{proxy, Connection};

use super::{PortalBackend, PortalResponse, PortalResults, Stage};
use crate::config::SourceSelection;
use crate::error::{LumenError, Result};
use crate::event::{Event, EventSender};
use crate::types::{
    PortalRequest, SessionHandle, SessionToken, SourceKind, StreamDescriptor,
};

#[proxy(
    interface = "org.freedesktop.portal.ScreenCast",
    default_service = "org.freedesktop.portal.Desktop",
    default_path = "/org/freedesktop/portal/desktop",
    gen_blocking = false
)]
trait ScreenCast {
    async fn create_session(
        &self,
        options: HashMap<&str, Value<'_>>,
    ) -> zbus::Result<OwnedObjectPath>;

    async fn select_sources(
        &self,
        session_handle: &ObjectPath<'_>,
        options: HashMap<&str, Value<'_>>,
    ) -> zbus::Result<OwnedObjectPath>;

    async fn start(
        &self,
        session_handle: &ObjectPath<'_>,
        parent_window: &str,
        options: HashMap<&str, Value<'_>>,
    ) -> zbus::Result<OwnedObjectPath>;

    #[zbus(name = "OpenPipeWireRemote")]
    async fn open_pipewire_remote(
        &self,
        session_handle: &ObjectPath<'_>,
        options: HashMap<&str, Value<'_>>,
    ) -> zbus::Result<zbus::zvariant::OwnedFd>;

    #[zbus(property)]
    fn available_source_types(&self) -> zbus::Result<u32>;

    #[zbus(property)]
    fn available_cursor_modes(&self) -> zbus::Result<u32>;

    #[zbus(property, name = "version")]
    fn version(&self) -> zbus::Result<u32>;
}

#[proxy(
    interface = "org.freedesktop.portal.Request",
    default_service = "org.freedesktop.portal.Desktop",
    gen_blocking = false
)]
trait Request {
    #[zbus(signal)]
    fn response(&self, response: u32, results: HashMap<String, OwnedValue>) -> zbus::Result<()>;
}

#[proxy(
    interface = "org.freedesktop.portal.Session",
    default_service = "org.freedesktop.portal.Desktop",
    gen_blocking = false
)]
trait Session {
    async fn close(&self) -> zbus::Result<()>;
}

/// CreateSession results
#[derive(Debug, Default, DeserializeDict, Type)]
#[zvariant(signature = "dict")]
struct CreateSessionResults {
    session_handle: Option<String>,
}

/// Start results
#[derive(Debug, Default, DeserializeDict, Type)]
#[zvariant(signature = "dict")]
struct StartResults {
    streams: Option<Vec<(u32, StreamProperties)>>,
}

/// Per-stream properties from the Start results
#[derive(Debug, Default, DeserializeDict, Type)]
#[zvariant(signature = "dict")]
pub struct StreamProperties {
    pub id: Option<String>,
    pub position: Option<(i32, i32)>,
    pub size: Option<(i32, i32)>,
    pub source_type: Option<u32>,
}

impl StreamDescriptor {
    /// Build a descriptor from one `(node_id, properties)` entry of the
    /// Start results; missing or negative geometry falls back to `fallback`
    pub fn from_portal(node_id: u32, props: &StreamProperties, fallback: (u32, u32)) -> Self {
        let (width, height) = match props.size {
            Some((w, h)) if w > 0 && h > 0 => (w as u32, h as u32),
            _ => fallback,
        };
        Self {
            node_id,
            width,
            height,
            source_kind: props.source_type.and_then(SourceKind::from_portal_bits),
        }
    }
}

/// Screencast portal capabilities, for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortalInfo {
    pub version: u32,
    pub source_types: u32,
    pub cursor_modes: u32,
}

/// Portal client bound to the session bus
///
/// Requests run as local tasks on the default glib main context; outcomes are
/// posted to the dispatcher channel.
pub struct DbusPortal {
    connection: Connection,
    screencast: ScreenCastProxy<'static>,
    events: EventSender,
    fallback_size: (u32, u32),
}

impl DbusPortal {
    /// Connect to the session bus and bind the screencast portal
    pub async fn connect(events: EventSender, fallback_size: (u32, u32)) -> Result<Self> {
        let connection = Connection::session().await?;
        let screencast = ScreenCastProxy::new(&connection).await?;

        info!(
            "Connected to screencast portal as {}",
            connection
                .unique_name()
                .map(|n| n.to_string())
                .unwrap_or_default()
        );

        Ok(Self {
            connection,
            screencast,
            events,
            fallback_size,
        })
    }

    /// Unique bus name of this client (e.g. `:1.42`)
    pub fn unique_name(&self) -> Result<String> {
        self.connection
            .unique_name()
            .map(|n| n.to_string())
            .ok_or_else(|| LumenError::portal("Session bus connection has no unique name"))
    }

    /// Query the portal's interface version and supported options
    pub async fn probe(&self) -> Result<PortalInfo> {
        Ok(PortalInfo {
            version: self.screencast.version().await?,
            source_types: self.screencast.available_source_types().await?,
            cursor_modes: self.screencast.available_cursor_modes().await?,
        })
    }

    /// Run a request on the main context and post its Response
    fn spawn_request<R, C, F>(&self, request: &PortalRequest, stage: Stage, call: C, decode: F)
    where
        R: DeserializeOwned + Type + 'static,
        C: Future<Output = zbus::Result<OwnedObjectPath>> + 'static,
        F: FnOnce(R) -> PortalResults + 'static,
    {
        let connection = self.connection.clone();
        let events = self.events.clone();
        let request = request.clone();

        debug!("{} -> {}", stage, request.path);

        glib::MainContext::default().spawn_local(async move {
            let response = await_response::<R, C>(&connection, &request, call)
                .await
                .map(|(status, results)| PortalResponse {
                    status,
                    results: decode(results),
                })
                .map_err(|e| e.with_context(format!("{} request {}", stage, request.token)));

            if events
                .send(Event::Portal {
                    request: request.token,
                    response,
                })
                .is_err()
            {
                debug!("Dispatcher gone, dropping {} response", stage);
            }
        });
    }
}

/// Subscribe to the request's Response, issue the call, await one reply
async fn await_response<R, C>(
    connection: &Connection,
    request: &PortalRequest,
    call: C,
) -> Result<(u32, R)>
where
    R: DeserializeOwned + Type,
    C: Future<Output = zbus::Result<OwnedObjectPath>>,
{
    let mut responses = subscribe_response(connection, request.path.clone()).await?;

    let handle = call.await?;
    if handle.as_str() != request.path {
        // Older portals ignore handle_token; follow the path they chose
        warn!(
            "Portal registered request at {} instead of {}",
            handle, request.path
        );
        responses = subscribe_response(connection, handle.as_str().to_owned()).await?;
    }

    let response = responses
        .next()
        .await
        .ok_or_else(|| LumenError::portal("Response stream closed before a reply arrived"))?;
    let reply: (u32, R) = response.message().body().deserialize()?;
    Ok(reply)
}

async fn subscribe_response(connection: &Connection, path: String) -> Result<ResponseStream> {
    let proxy = RequestProxy::builder(connection)
        .path(path)?
        .cache_properties(CacheProperties::No)
        .build()
        .await?;
    Ok(proxy.receive_response().await?)
}

fn request_options(request: &PortalRequest) -> HashMap<&'static str, Value<'static>> {
    HashMap::from([("handle_token", Value::from(request.token.to_string()))])
}

impl PortalBackend for DbusPortal {
    fn create_session(&mut self, request: &PortalRequest, session: SessionToken) {
        let mut options = request_options(request);
        options.insert("session_handle_token", Value::from(session.to_string()));

        let screencast = self.screencast.clone();
        self.spawn_request(
            request,
            Stage::CreateSession,
            async move { screencast.create_session(options).await },
            |results: CreateSessionResults| PortalResults::Session {
                session_handle: results.session_handle,
            },
        );
    }

    fn select_sources(
        &mut self,
        request: &PortalRequest,
        session: &SessionHandle,
        selection: &SourceSelection,
    ) {
        let mut options = request_options(request);
        options.insert("multiple", Value::from(selection.multiple));
        options.insert("cursor_mode", Value::from(selection.cursor_mode.portal_bits()));
        options.insert("types", Value::from(selection.types_bits()));

        let screencast = self.screencast.clone();
        let session = session.clone();
        self.spawn_request(
            request,
            Stage::SelectSources,
            async move {
                let session_path = ObjectPath::try_from(session.as_str())?;
                screencast.select_sources(&session_path, options).await
            },
            |_: HashMap<String, OwnedValue>| PortalResults::Sources,
        );
    }

    fn start(&mut self, request: &PortalRequest, session: &SessionHandle) {
        let options = request_options(request);
        let fallback = self.fallback_size;

        let screencast = self.screencast.clone();
        let session = session.clone();
        self.spawn_request(
            request,
            Stage::Start,
            async move {
                let session_path = ObjectPath::try_from(session.as_str())?;
                screencast.start(&session_path, "", options).await
            },
            move |results: StartResults| {
                PortalResults::Streams(
                    results
                        .streams
                        .unwrap_or_default()
                        .iter()
                        .map(|(node_id, props)| StreamDescriptor::from_portal(*node_id, props, fallback))
                        .collect(),
                )
            },
        );
    }

    fn open_pipewire_remote(&mut self, session: &SessionHandle, token: SessionToken) {
        let screencast = self.screencast.clone();
        let events = self.events.clone();
        let session = session.clone();

        glib::MainContext::default().spawn_local(async move {
            let result = async {
                let session_path = ObjectPath::try_from(session.as_str())?;
                let fd = screencast
                    .open_pipewire_remote(&session_path, HashMap::new())
                    .await?;
                Ok::<OwnedFd, LumenError>(fd.into())
            }
            .await;

            if events
                .send(Event::RemoteOpened {
                    session: token,
                    result,
                })
                .is_err()
            {
                debug!("Dispatcher gone, dropping PipeWire remote for {}", session);
            }
        });
    }

    fn close_session(&mut self, session: &SessionHandle) {
        let connection = self.connection.clone();
        let session = session.clone();

        glib::MainContext::default().spawn_local(async move {
            let closed = async {
                let proxy = SessionProxy::builder(&connection)
                    .path(session.as_str().to_owned())?
                    .cache_properties(CacheProperties::No)
                    .build()
                    .await?;
                proxy.close().await
            }
            .await;

            match closed {
                Ok(()) => info!("Closed portal session {}", session),
                Err(e) => warn!("Failed to close session {}: {}", session, e),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_from_portal_properties() {
        let props = StreamProperties {
            size: Some((1920, 1080)),
            source_type: Some(1),
            ..Default::default()
        };
        let stream = StreamDescriptor::from_portal(42, &props, (640, 480));
        assert_eq!(stream.node_id, 42);
        assert_eq!((stream.width, stream.height), (1920, 1080));
        assert_eq!(stream.source_kind, Some(SourceKind::Monitor));
    }

    #[test]
    fn test_stream_without_size_uses_fallback() {
        let props = StreamProperties::default();
        let stream = StreamDescriptor::from_portal(7, &props, (1920, 1080));
        assert_eq!((stream.width, stream.height), (1920, 1080));
        assert_eq!(stream.source_kind, None);

        let props = StreamProperties {
            size: Some((0, -5)),
            ..Default::default()
        };
        let stream = StreamDescriptor::from_portal(7, &props, (800, 600));
        assert_eq!((stream.width, stream.height), (800, 600));
    }

    #[test]
    fn test_request_options_carry_handle_token() {
        let request = PortalRequest {
            token: crate::types::TokenMinter::new(":1.3").next_request().token,
            path: String::new(),
        };
        let options = request_options(&request);
        assert_eq!(options.get("handle_token"), Some(&Value::from("u1")));
    }
}
