//! HTTP channels against mock provider servers

use noticer::config::{GroupRobotConfig, PhoneConfig, SmsConfig, WorkerBotConfig};
use noticer::message::{ding_group, ding_worker, yach_worker};
use noticer::transport::sign;
use noticer::{
    Context, DingGroupChannel, DingGroupMessage, DingWorkerChannel, DingWorkerMessage, Endpoint,
    EndpointTransport, MemoryStore, NoticeError, PhoneChannel, RobotHttpTransport, SmsChannel,
    TicketCache, WorkerRecipients, YachWorkerChannel, YachWorkerMessage,
};
use reqwest::Client;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use wiremock::matchers::{body_string_contains, header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn query(request: &Request) -> HashMap<String, String> {
    request.url.query_pairs().into_owned().collect()
}

fn body(request: &Request) -> String {
    String::from_utf8_lossy(&request.body).into_owned()
}

mod robot {
    use super::*;

    #[tokio::test]
    async fn test_unsigned_robot_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/robot/send"))
            .and(query_param("access_token", "tok-a"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"errcode": 0})))
            .expect(1)
            .mount(&server)
            .await;

        let transport = RobotHttpTransport::new(Client::new(), format!("{}/robot/send", server.uri()));
        let payload = json!({"msgtype": "text", "text": {"content": "hi"}});
        let response = transport.call(&Endpoint::new("tok-a"), &payload).await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.json(), Some(json!({"errcode": 0})));
        assert_eq!(response.query, Some(json!({"access_token": "tok-a"})));

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests[0].body_json::<Value>().unwrap(), payload);
        assert!(!query(&requests[0]).contains_key("sign"));
    }

    #[tokio::test]
    async fn test_signed_robot_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/robot/send"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"errcode": 0})))
            .mount(&server)
            .await;

        let transport = RobotHttpTransport::new(Client::new(), format!("{}/robot/send", server.uri()));
        let robot = Endpoint::with_secret("tok-b", "SEC123");
        let response = transport.call(&robot, &json!({"msgtype": "text"})).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let params = query(&requests[0]);
        let timestamp: i64 = params["timestamp"].parse().unwrap();
        assert_eq!(params["access_token"], "tok-b");
        assert_eq!(params["sign"], sign("SEC123", timestamp).unwrap());

        // the signature is left out of failure context
        let recorded = response.query.unwrap();
        assert_eq!(recorded["timestamp"], params["timestamp"].as_str());
        assert!(recorded.get("sign").is_none());
    }

    #[tokio::test]
    async fn test_group_channel_fails_over_over_http() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/robot/send"))
            .and(query_param("access_token", "broken"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"errcode": 310000, "errmsg": "keywords not in content"})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/robot/send"))
            .and(query_param("access_token", "healthy"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"errcode": 0, "errmsg": "ok"})))
            .expect(1)
            .mount(&server)
            .await;

        let config = GroupRobotConfig {
            uri_push: format!("{}/robot/send", server.uri()),
            ..GroupRobotConfig::ding()
        };
        let channel =
            DingGroupChannel::from_config(&config, Client::new(), Arc::new(MemoryStore::new()), None);
        let message: DingGroupMessage = ding_group::Markdown::new("alert", "## disk full").into();

        let report = channel
            .send(
                &message,
                &[Endpoint::new("broken"), Endpoint::new("healthy")],
                None,
            )
            .await
            .unwrap();

        assert_eq!(report.endpoint, "healthy");
        assert_eq!(report.attempts, 2);
    }
}

mod worker {
    use super::*;

    fn config(server: &MockServer) -> WorkerBotConfig {
        WorkerBotConfig {
            enabled: true,
            appid: "app".to_string(),
            appkey: "key".to_string(),
            uri_get_ticket: format!("{}/ticket", server.uri()),
            uri_notice: format!("{}/notice", server.uri()),
            ..WorkerBotConfig::default()
        }
    }

    async fn mount_ticket(server: &MockServer, expected_calls: u64) {
        Mock::given(method("GET"))
            .and(path("/ticket"))
            .and(query_param("appid", "app"))
            .and(query_param("appkey", "key"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"errcode": 0, "ticket": "T-1"})),
            )
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_ticket_is_fetched_once_and_cached() {
        let server = MockServer::start().await;
        mount_ticket(&server, 1).await;
        Mock::given(method("POST"))
            .and(path("/notice"))
            .and(body_string_contains("ticket=T-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"errcode": 0})))
            .expect(2)
            .mount(&server)
            .await;

        let cache = Arc::new(MemoryStore::new());
        let channel = DingWorkerChannel::new(&config(&server), Client::new(), cache.clone());
        let message: DingWorkerMessage = ding_worker::Text::new("build failed").into();
        let recipients = WorkerRecipients::Workcodes(vec!["007".to_string(), "008".to_string()]);

        channel.send(&message, &recipients).await.unwrap();
        channel.send(&message, &recipients).await.unwrap();

        assert_eq!(channel.ticket_key(), "dingworker.ticket.app");
        assert_eq!(
            cache.get("dingworker.ticket.app").await.unwrap().as_deref(),
            Some("T-1")
        );

        let requests = server.received_requests().await.unwrap();
        let notice = body(requests.last().unwrap());
        assert!(notice.contains("type=text"));
        assert!(notice.contains("workcodes=007%7C008"));
    }

    #[tokio::test]
    async fn test_frequency_limit_is_rate_limited() {
        let server = MockServer::start().await;
        mount_ticket(&server, 1).await;
        Mock::given(method("POST"))
            .and(path("/notice"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"errcode": 426, "errmsg": "too many messages"})),
            )
            .mount(&server)
            .await;

        let channel =
            DingWorkerChannel::new(&config(&server), Client::new(), Arc::new(MemoryStore::new()));
        let message: DingWorkerMessage = ding_worker::Text::new("hi").into();
        let err = channel
            .send(&message, &WorkerRecipients::Emails(vec!["a@x.com".to_string()]))
            .await
            .unwrap_err();

        assert!(matches!(err, NoticeError::RateLimited { .. }));
        assert_eq!(err.code(), 2003);
        assert_eq!(
            err.to_string(),
            "notice by dingworker failed, reach frequency limit"
        );
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_provider_error_carries_response() {
        let server = MockServer::start().await;
        mount_ticket(&server, 1).await;
        Mock::given(method("POST"))
            .and(path("/notice"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"errcode": 40003, "errmsg": "invalid userid"})),
            )
            .mount(&server)
            .await;

        let channel =
            DingWorkerChannel::new(&config(&server), Client::new(), Arc::new(MemoryStore::new()));
        let message: DingWorkerMessage = ding_worker::Markdown::new("title", "**body**").into();
        let err = channel
            .send(&message, &WorkerRecipients::Emails(vec!["a@x.com".to_string()]))
            .await
            .unwrap_err();

        assert_eq!(err.code(), 2004);
        assert_eq!(
            err.to_string(),
            "notice by dingworker failed, error: invalid userid"
        );
        assert_eq!(err.context().unwrap()["json"]["errcode"], 40003);
    }

    #[tokio::test]
    async fn test_ticket_failure_stops_before_notice() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ticket"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"errcode": 1, "errmsg": "bad appkey"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/notice"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"errcode": 0})))
            .expect(0)
            .mount(&server)
            .await;

        let channel =
            YachWorkerChannel::new(&config(&server), Client::new(), Arc::new(MemoryStore::new()));
        let message: YachWorkerMessage = yach_worker::Text::new("hi").into();
        let err = channel
            .send(&message, &WorkerRecipients::Emails(vec!["a@x.com".to_string()]))
            .await
            .unwrap_err();

        assert_eq!(err.code(), 7004);
        assert_eq!(
            err.to_string(),
            "get yachworker ticket failed, error: bad appkey"
        );
    }

    #[tokio::test]
    async fn test_yach_worker_form() {
        let server = MockServer::start().await;
        mount_ticket(&server, 1).await;
        Mock::given(method("POST"))
            .and(path("/notice"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"errcode": 0})))
            .expect(1)
            .mount(&server)
            .await;

        let channel =
            YachWorkerChannel::new(&config(&server), Client::new(), Arc::new(MemoryStore::new()));
        let message: YachWorkerMessage = yach_worker::Text::new("hi").into();
        channel
            .send(&message, &WorkerRecipients::Emails(vec!["a@x.com".to_string()]))
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        let form = body(requests.last().unwrap());
        assert!(form.contains("user_type=email"));
        assert!(form.contains("userid_list=a%40x.com"));
        assert!(form.contains("message="));
        assert!(form.contains("ticket=T-1"));
    }
}

mod sms {
    use super::*;

    fn channel(server: &MockServer) -> SmsChannel {
        let config = SmsConfig {
            enabled: true,
            base_uri: format!("{}/", server.uri()),
            appid: "app".to_string(),
            secret: "s3cret".to_string(),
            ..SmsConfig::default()
        };
        SmsChannel::new(&config, Client::new(), Arc::new(MemoryStore::new()))
    }

    async fn mount_ticket(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/v1/ticket/get"))
            .and(query_param("appid", "app"))
            .and(query_param("secret", "s3cret"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"errcode": 0, "data": {"ticket": "S-1"}})),
            )
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_send_uses_ticket() {
        let server = MockServer::start().await;
        mount_ticket(&server).await;
        Mock::given(method("POST"))
            .and(path("/v1/sms/send"))
            .and(query_param("ticket", "S-1"))
            .and(body_string_contains("tpl_id=tpl-9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"errcode": 0})))
            .expect(1)
            .mount(&server)
            .await;

        channel(&server)
            .send("tpl-9", &json!({"code": "1234"}), &["13800000000".to_string()])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_gateway_errors() {
        let server = MockServer::start().await;
        mount_ticket(&server).await;
        Mock::given(method("POST"))
            .and(path("/v1/sms/send"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"errcode": 1001, "errmsg": "template not found"})),
            )
            .mount(&server)
            .await;

        let err = channel(&server)
            .send("missing", &json!({}), &["13800000000".to_string()])
            .await
            .unwrap_err();

        assert_eq!(err.code(), 4004);
        assert_eq!(err.to_string(), "notice by sms failed, error: template not found");
    }

    #[tokio::test]
    async fn test_non_200_status() {
        let server = MockServer::start().await;
        mount_ticket(&server).await;
        Mock::given(method("POST"))
            .and(path("/v1/sms/send"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let err = channel(&server)
            .send("tpl-9", &json!({}), &["13800000000".to_string()])
            .await
            .unwrap_err();

        assert_eq!(err.code(), 4001);
        assert_eq!(err.context().unwrap()["status_code"], 502);
        assert_eq!(err.context().unwrap()["body"], "bad gateway");
    }
}

mod phone {
    use super::*;

    fn channel(server: &MockServer) -> PhoneChannel {
        let config = PhoneConfig {
            enabled: true,
            base_uri: format!("{}/2013-12-26/", server.uri()),
            sid: "SID".to_string(),
            token: "TOKEN".to_string(),
            appid: "APP".to_string(),
            options: HashMap::new(),
        };
        PhoneChannel::new(&config, Client::new())
    }

    #[tokio::test]
    async fn test_call_is_signed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/2013-12-26/Accounts/SID/Calls/LandingCalls/"))
            .and(header_exists("authorization"))
            .and(header("accept", "application/json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"statusCode": "000000", "callSid": "c-1"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let mut options = Context::new();
        options.insert("playTimes".to_string(), json!("2"));
        let channel = channel(&server);
        let response = channel
            .send("server down", "13800000000", Some(&options))
            .await
            .unwrap();
        assert_eq!(response["callSid"], "c-1");

        let requests = server.received_requests().await.unwrap();
        let request = &requests[0];
        let sig = query(request).remove("sig").unwrap();
        assert_eq!(sig.len(), 32);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));

        assert_eq!(
            request.body_json::<Value>().unwrap(),
            json!({
                "appId": "APP",
                "to": "13800000000",
                "mediaTxt": "server down",
                "playTimes": "2"
            })
        );
    }

    #[tokio::test]
    async fn test_provider_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"statusCode": "160040", "statusMsg": "daily limit reached"})),
            )
            .mount(&server)
            .await;

        let err = channel(&server)
            .send("server down", "13800000000", None)
            .await
            .unwrap_err();

        assert_eq!(err.code(), 3004);
        assert_eq!(
            err.to_string(),
            "notice by phone failed, error: daily limit reached"
        );
    }

    #[tokio::test]
    async fn test_missing_status_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "ok"})))
            .mount(&server)
            .await;

        let err = channel(&server)
            .send("server down", "13800000000", None)
            .await
            .unwrap_err();

        assert_eq!(err.code(), 3002);
        assert_eq!(err.to_string(), "notice by phone failed, not key statusCode");
    }
}
