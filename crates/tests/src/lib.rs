//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试
//! - CSV -> 渲染 -> 投递 的端到端测试（file / smtp / 失败注入）
//! - 取消场景下的收件人守恒

#[cfg(test)]
mod contract_tests {
    use contracts::{DispatchSettings, TransportType};

    #[test]
    fn test_contract_defaults() {
        let _ = contracts::ConfigVersion::V1;
        let settings = DispatchSettings::default();
        assert_eq!(settings.worker_count, 5);
        assert_eq!(settings.channel_capacity, 0);
        assert_eq!(settings.timeout(), None);
        assert_eq!(TransportType::default(), TransportType::Log);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::collections::{BTreeMap, HashSet};
    use std::fs;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use config_loader::ConfigLoader;
    use contracts::{
        BodyFormat, CampaignMetadata, DeliveryAck, DeliveryTransport, DispatchReport, Message,
        TransportError,
    };
    use dispatcher::{
        build_transport, DispatchConfig, DispatchCoordinator, FileTransport, FileTransportConfig,
        LogTransport, SmtpTransport, SmtpTransportConfig,
    };
    use ingestion::{CsvOptions, CsvRecipientSource};
    use renderer::TemplateRenderer;
    use tempfile::tempdir;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    const RECIPIENTS: &str = "\
name,email,city
Alice Smith,a@x.com,Oslo
Bob Jones,b@x.com,Lima
Carol White,c@x.com,Pune
";

    fn campaign(template: &str, body_format: BodyFormat) -> CampaignMetadata {
        CampaignMetadata {
            from: "News <news@x.com>".into(),
            subject: "Hello {{first_name}}".into(),
            template: template.into(),
            body_format,
            cta_text: None,
            cta_link: None,
            variables: BTreeMap::from([("company".to_string(), "Acme".to_string())]),
        }
    }

    type CsvSource = CsvRecipientSource<BufReader<tokio::fs::File>>;

    async fn csv_source(dir: &Path, content: &str) -> CsvSource {
        let path = dir.join("recipients.csv");
        fs::write(&path, content).unwrap();
        CsvRecipientSource::open(&path, CsvOptions::default())
            .await
            .unwrap()
    }

    async fn run_with<T>(
        workers: usize,
        campaign: CampaignMetadata,
        transport: Arc<T>,
        source: CsvSource,
    ) -> DispatchReport
    where
        T: DeliveryTransport + Sync + 'static,
    {
        let renderer = TemplateRenderer::new(&campaign).unwrap();
        let config = DispatchConfig {
            worker_count: workers,
            channel_capacity: 2,
            ..Default::default()
        };
        DispatchCoordinator::new(config, Arc::new(campaign), Arc::new(renderer), transport)
            .run(source)
            .await
            .unwrap()
    }

    /// Fails for chosen addresses, delegates the rest to a LogTransport
    struct FailingFor {
        inner: LogTransport,
        failing: HashSet<&'static str>,
        delay: Duration,
        delivered: Mutex<Vec<String>>,
    }

    impl FailingFor {
        fn new(failing: &[&'static str], delay: Duration) -> Self {
            Self {
                inner: LogTransport::new("log"),
                failing: failing.iter().copied().collect(),
                delay,
                delivered: Mutex::new(Vec::new()),
            }
        }
    }

    impl DeliveryTransport for FailingFor {
        fn name(&self) -> &str {
            "failing-for"
        }

        async fn send(&self, message: &Message) -> Result<DeliveryAck, TransportError> {
            tokio::time::sleep(self.delay).await;
            if self.failing.contains(message.to_address.as_str()) {
                return Err(TransportError::rejected("550 5.1.1 user unknown"));
            }
            let ack = self.inner.send(message).await?;
            self.delivered
                .lock()
                .unwrap()
                .push(message.to_address.clone());
            Ok(ack)
        }
    }

    /// End-to-end: CSV file -> TemplateRenderer -> FileTransport
    ///
    /// 验证：
    /// 1. 每个有效行生成一个 .eml 文件
    /// 2. 格式错误的行被跳过，不中断运行
    /// 3. 正文按收件人个性化
    #[tokio::test]
    async fn test_e2e_csv_to_file_transport() {
        let dir = tempdir().unwrap();
        let outbox = dir.path().join("outbox");
        let csv = format!("{RECIPIENTS}broken row without email\n,missing@x.com\n");
        let source = csv_source(dir.path(), &csv).await;

        let transport = Arc::new(
            FileTransport::new("file", FileTransportConfig { dir: outbox.clone() }).unwrap(),
        );
        let report = run_with(
            2,
            campaign("Hi {{name}} in {{city}}, from {{company}}", BodyFormat::Text),
            transport,
            source,
        )
        .await;

        assert_eq!(report.sent_count, 3);
        assert_eq!(report.failed_count, 0);
        assert_eq!(report.malformed_count, 2);
        assert!(report.is_clean());

        let mut files: Vec<_> = fs::read_dir(&outbox)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        files.sort();
        assert_eq!(files.len(), 3);

        let bodies: Vec<String> = files
            .iter()
            .map(|p| fs::read_to_string(p).unwrap())
            .collect();
        let bob = bodies
            .iter()
            .find(|b| b.contains("To: Bob Jones <b@x.com>\r\n"))
            .expect("Bob's message written");
        assert!(bob.contains("Subject: Hello Bob\r\n"));
        assert!(bob.contains("Hi Bob Jones in Lima, from Acme"));
    }

    /// Scenario: transport fails for b@x.com only
    #[tokio::test]
    async fn test_e2e_single_recipient_failure() {
        let dir = tempdir().unwrap();
        let source = csv_source(dir.path(), "name,email\nAlice,a@x.com\nBob,b@x.com\n").await;
        let transport = Arc::new(FailingFor::new(&["b@x.com"], Duration::ZERO));

        let report = run_with(
            2,
            campaign("Hi {{name}}", BodyFormat::Text),
            Arc::clone(&transport),
            source,
        )
        .await;

        assert_eq!(report.sent_count, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].recipient.name, "Bob");
        assert!(report.failures[0].error.to_string().contains("550"));
        assert_eq!(transport.inner.sent_count(), 1);
    }

    /// Template field missing for one recipient fails only that message
    #[tokio::test]
    async fn test_e2e_missing_attribute_fails_one_message() {
        let dir = tempdir().unwrap();
        // Bob's short row leaves `plan` unset
        let source =
            csv_source(dir.path(), "name,email,plan\nAlice,a@x.com,pro\nBob,b@x.com\n").await;
        let transport = Arc::new(LogTransport::new("log"));

        let report = run_with(
            1,
            campaign("Your plan: {{plan}}", BodyFormat::Text),
            Arc::clone(&transport),
            source,
        )
        .await;

        assert_eq!(report.sent_count, 1);
        assert_eq!(report.failed_count, 1);
        assert_eq!(report.failures[0].recipient.name, "Bob");
        assert_eq!(report.failures[0].error.label(), "template");
        assert_eq!(transport.sent_count(), 1);
    }

    /// Cancellation mid-run: every recipient is sent, failed or skipped
    #[tokio::test]
    async fn test_e2e_cancel_conserves_recipients() {
        let dir = tempdir().unwrap();
        let mut csv = String::from("name,email\n");
        for i in 0..60 {
            csv.push_str(&format!("User {i},user{i}@x.com\n"));
        }
        let source = csv_source(dir.path(), &csv).await;
        let transport = Arc::new(FailingFor::new(
            &["user3@x.com", "user4@x.com"],
            Duration::from_millis(15),
        ));

        let campaign = campaign("Hi {{name}}", BodyFormat::Text);
        let renderer = TemplateRenderer::new(&campaign).unwrap();
        let coordinator = DispatchCoordinator::new(
            DispatchConfig {
                worker_count: 4,
                ..Default::default()
            },
            Arc::new(campaign),
            Arc::new(renderer),
            Arc::clone(&transport),
        );
        let cancel = coordinator.cancellation_token();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(60)).await;
            cancel.cancel();
        });

        let report = coordinator.run(source).await.unwrap();

        assert!(report.cancelled);
        assert_eq!(report.total(), 60);
        assert!(report.skipped_count > 0);
        let delivered = transport.delivered.lock().unwrap().clone();
        assert_eq!(delivered.len() as u64, report.sent_count);

        let mut everyone: Vec<String> = delivered;
        everyone.extend(report.retry_candidates().map(|r| r.email.clone()));
        everyone.sort();
        everyone.dedup();
        assert_eq!(everyone.len(), 60);
    }

    /// Minimal SMTP sink accepting every message; counts completed DATA blocks
    async fn smtp_sink(listener: TcpListener, accepted: Arc<AtomicUsize>) {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let accepted = Arc::clone(&accepted);
            tokio::spawn(async move {
                let (read, mut write) = stream.into_split();
                let mut reader = BufReader::new(read);
                write.write_all(b"220 sink ESMTP\r\n").await.unwrap();
                let mut in_data = false;
                loop {
                    let mut line = String::new();
                    if reader.read_line(&mut line).await.unwrap_or(0) == 0 {
                        return;
                    }
                    if in_data {
                        if line == ".\r\n" {
                            in_data = false;
                            accepted.fetch_add(1, Ordering::SeqCst);
                            write.write_all(b"250 queued\r\n").await.unwrap();
                        }
                        continue;
                    }
                    let upper = line.to_ascii_uppercase();
                    let reply: &[u8] = if upper.starts_with("DATA") {
                        in_data = true;
                        b"354 go ahead\r\n"
                    } else if upper.starts_with("QUIT") {
                        let _ = write.write_all(b"221 bye\r\n").await;
                        return;
                    } else {
                        b"250 OK\r\n"
                    };
                    write.write_all(reply).await.unwrap();
                }
            });
        }
    }

    /// End-to-end over SMTP with several concurrent connections
    #[tokio::test]
    async fn test_e2e_smtp_transport() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let accepted = Arc::new(AtomicUsize::new(0));
        let server = tokio::spawn(smtp_sink(listener, Arc::clone(&accepted)));

        let dir = tempdir().unwrap();
        let source = csv_source(dir.path(), RECIPIENTS).await;
        let transport = Arc::new(SmtpTransport::new(
            "smtp",
            SmtpTransportConfig {
                host: "127.0.0.1".into(),
                port,
                timeout: Duration::from_secs(5),
                helo_name: "e2e".into(),
            },
        ));

        let report = run_with(
            3,
            campaign("<p>Hi {{name}}</p>", BodyFormat::Html),
            transport,
            source,
        )
        .await;
        server.abort();

        assert_eq!(report.sent_count, 3, "{report}");
        assert_eq!(accepted.load(Ordering::SeqCst), 3);
        assert_eq!(report.send_latency.count, 3);
    }

    /// Configuration file drives the whole run (file transport)
    #[tokio::test]
    async fn test_e2e_from_config_file() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("recipients.csv"), RECIPIENTS).unwrap();
        fs::write(
            dir.path().join("welcome.html"),
            "<h1>Welcome {{first_name}}</h1><a href=\"{{cta_link}}\">{{cta_text}}</a>",
        )
        .unwrap();
        let outbox = dir.path().join("outbox");
        let config_path = dir.path().join("campaign.toml");
        fs::write(
            &config_path,
            format!(
                r#"
[campaign]
from = "News <news@x.com>"
subject = "Welcome {{{{first_name}}}}"
template_path = "welcome.html"
body_format = "html"
cta_text = "Start <now>"
cta_link = "https://x.com/start"

[source]
path = "recipients.csv"

[dispatch]
worker_count = 2
pace_delay_ms = 1

[transport]
transport_type = "file"
[transport.params]
dir = "{}"
"#,
                outbox.display()
            ),
        )
        .unwrap();

        let blueprint = ConfigLoader::load_from_path(&config_path).unwrap();
        let campaign = blueprint.to_campaign_metadata().unwrap();
        let renderer = TemplateRenderer::new(&campaign).unwrap();
        let transport = build_transport(&blueprint.transport).unwrap();
        let source = CsvRecipientSource::open(
            &blueprint.source.path,
            CsvOptions {
                has_header: blueprint.source.has_header,
            },
        )
        .await
        .unwrap();

        let report = DispatchCoordinator::new(
            DispatchConfig::from(&blueprint.dispatch),
            Arc::new(campaign),
            Arc::new(renderer),
            Arc::new(transport),
        )
        .run(source)
        .await
        .unwrap();

        assert_eq!(report.sent_count, 3);
        let alice = fs::read_dir(&outbox)
            .unwrap()
            .map(|e| fs::read_to_string(e.unwrap().path()).unwrap())
            .find(|m| m.contains("a@x.com"))
            .unwrap();
        assert!(alice.contains("Content-Type: text/html; charset=utf-8\r\n"));
        assert!(alice.contains("<h1>Welcome Alice</h1>"));
        assert!(alice.contains("Start &lt;now&gt;"));
    }
}
