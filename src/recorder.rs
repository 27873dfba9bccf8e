use std::future::Future;

use chrono::Local;

use crate::{
    config::{ConfigError, OptionKey, Options, Paths},
    http::{HttpClient, RequestError},
    metadata::{MetadataResolver, ResolveError},
    progress::WaitObserver,
    quality::StreamLink,
    wait::{self, WaitError, WaitOptions, WaitOutcome},
    ytdlp::{self, DownloadEngine, DownloadError},
};

#[derive(thiserror::Error, Debug)]
pub enum RecorderError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Wait(#[from] WaitError),
    #[error(transparent)]
    Download(#[from] DownloadError),
}

/// Ties the pieces together for one user: resolve, wait, record.
pub struct Recorder {
    client: HttpClient,
    options: Options,
    paths: Paths,
    resolver: MetadataResolver,
    engine: Box<dyn DownloadEngine>,
}

impl Recorder {
    pub fn new(
        options: Options,
        paths: Paths,
        engine: Box<dyn DownloadEngine>,
    ) -> Result<Self, RecorderError> {
        Self::with_resolver(options, paths, engine, MetadataResolver::new())
    }

    pub fn with_resolver(
        options: Options,
        paths: Paths,
        engine: Box<dyn DownloadEngine>,
        resolver: MetadataResolver,
    ) -> Result<Self, RecorderError> {
        let mut client = HttpClient::new()?;
        client.set_cookies(
            options.get_option(OptionKey::SessionIdSs).as_deref(),
            options.get_option(OptionKey::TtTargetIdc).as_deref(),
        );
        client.update_proxy(options.get_option(OptionKey::Proxy).as_deref())?;

        Ok(Self {
            client,
            options,
            paths,
            resolver,
            engine,
        })
    }

    pub fn set_proxy(&mut self, proxy: Option<&str>) -> Result<(), RecorderError> {
        self.options.overrides.proxy = proxy.map(str::to_string);
        let proxy = self.options.get_option(OptionKey::Proxy);
        self.client.update_proxy(proxy.as_deref())?;
        Ok(())
    }

    pub fn resolver(&self) -> &MetadataResolver {
        &self.resolver
    }

    /// Resolves `username` and waits for it to go live when configured to.
    /// Returns `None` when the wait was cancelled.
    pub async fn resolve<C>(
        &mut self,
        username: &str,
        observer: &mut dyn WaitObserver,
        cancel: C,
    ) -> Result<Option<StreamLink>, RecorderError>
    where
        C: Future<Output = ()>,
    {
        let quality = self.options.quality()?;
        let wait_options = WaitOptions {
            wait_until_live: self.options.wait_until_live()?,
            interval: self.options.timeout()?,
        };

        self.resolver
            .initialize(&self.client, Some(username), quality)
            .await?;

        let outcome = wait::wait_until_live(
            &mut self.resolver,
            &self.client,
            &wait_options,
            observer,
            cancel,
        )
        .await?;

        match outcome {
            WaitOutcome::Cancelled => Ok(None),
            WaitOutcome::Live => Ok(Some(self.resolver.stream_link()?)),
        }
    }

    /// Full run: resolve, optionally wait, then hand the link to the
    /// download engine. Returns `Ok(WaitOutcome::Cancelled)` if the caller
    /// cancelled while waiting.
    pub async fn download<C>(
        &mut self,
        username: &str,
        observer: &mut dyn WaitObserver,
        cancel: C,
    ) -> Result<WaitOutcome, RecorderError>
    where
        C: Future<Output = ()>,
    {
        let link = match self.resolve(username, observer, cancel).await? {
            Some(link) => link,
            None => return Ok(WaitOutcome::Cancelled),
        };

        info!(
            "Starting download of @{} at quality {}: {}",
            username,
            link.quality,
            link.link.as_deref().unwrap_or("<none>")
        );

        let template =
            ytdlp::output_template(&self.paths.download_dir, username, link.quality, Local::now());
        ytdlp::record(self.engine.as_ref(), &link, &template).await?;

        Ok(WaitOutcome::Live)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::MockServer;

    use super::*;
    use crate::{
        config::{ConfigTable, Overrides},
        metadata::tests::{api_body, mock_api, resolver_for},
        progress::NoopObserver,
        quality::Quality,
        ytdlp::tests::FakeEngine,
    };

    fn options(overrides: Overrides) -> Options {
        Options::new(ConfigTable::default(), overrides)
    }

    #[tokio::test]
    async fn downloads_live_stream() {
        let server = MockServer::start().await;
        let data = json!({"data": {"origin": {"main": {"hls": "http://mock"}}}});
        mock_api(&server, api_body(2, Some(data)), 1).await;

        let dir = tempfile::tempdir().unwrap();
        let engine = FakeEngine::default();
        let mut recorder = Recorder::with_resolver(
            options(Overrides::default()),
            Paths::new(Some(dir.path())),
            Box::new(engine.clone()),
            resolver_for(&server),
        )
        .unwrap();

        let outcome = recorder
            .download("testuser", &mut NoopObserver, std::future::pending())
            .await
            .unwrap();

        assert_eq!(outcome, WaitOutcome::Live);
        let calls = engine.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "http://mock");
        let name = calls[0].1.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("testuser-"));
        assert!(name.ends_with("-original.%(ext)s"));
        assert!(calls[0].1.starts_with(dir.path().join("downloads").join("testuser")));
    }

    #[tokio::test]
    async fn offline_without_wait_is_an_error() {
        let server = MockServer::start().await;
        mock_api(&server, api_body(4, None), 1).await;

        let dir = tempfile::tempdir().unwrap();
        let engine = FakeEngine::default();
        let mut recorder = Recorder::with_resolver(
            options(Overrides::default()),
            Paths::new(Some(dir.path())),
            Box::new(engine.clone()),
            resolver_for(&server),
        )
        .unwrap();

        let err = recorder
            .download("testuser", &mut NoopObserver, std::future::pending())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            RecorderError::Wait(WaitError::UserNotLive(ref u)) if u == "testuser"
        ));
        assert!(engine.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn cancelled_wait_skips_download() {
        let server = MockServer::start().await;
        mock_api(&server, api_body(4, None), 1).await;

        let dir = tempfile::tempdir().unwrap();
        let engine = FakeEngine::default();
        let mut recorder = Recorder::with_resolver(
            options(Overrides {
                wait_until_live: Some(true),
                timeout: Some(5),
                ..Default::default()
            }),
            Paths::new(Some(dir.path())),
            Box::new(engine.clone()),
            resolver_for(&server),
        )
        .unwrap();

        let outcome = recorder
            .download("testuser", &mut NoopObserver, async {})
            .await
            .unwrap();

        assert_eq!(outcome, WaitOutcome::Cancelled);
        assert!(engine.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_link_for_quality() {
        let server = MockServer::start().await;
        let data = json!({"data": {"origin": {"main": {"hls": "http://mock"}}}});
        mock_api(&server, api_body(2, Some(data)), 1).await;

        let dir = tempfile::tempdir().unwrap();
        let mut recorder = Recorder::with_resolver(
            options(Overrides {
                quality: Some("sd".into()),
                ..Default::default()
            }),
            Paths::new(Some(dir.path())),
            Box::new(FakeEngine::default()),
            resolver_for(&server),
        )
        .unwrap();

        let err = recorder
            .download("testuser", &mut NoopObserver, std::future::pending())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            RecorderError::Download(DownloadError::LinkNotAvailable(Quality::Sd))
        ));
    }

    #[test]
    fn set_proxy_rebuilds_client() {
        let dir = tempfile::tempdir().unwrap();
        let mut recorder = Recorder::new(
            options(Overrides::default()),
            Paths::new(Some(dir.path())),
            Box::new(FakeEngine::default()),
        )
        .unwrap();

        recorder.set_proxy(Some("127.0.0.1:8080")).unwrap();
        assert_eq!(
            recorder.options.get_option(OptionKey::Proxy).as_deref(),
            Some("127.0.0.1:8080")
        );
        recorder.set_proxy(None).unwrap();
        assert_eq!(recorder.options.get_option(OptionKey::Proxy), None);
    }
}
