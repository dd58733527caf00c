//! 集成测试：存储故障
//!
//! 测试存储故障如何透传给调用方，以及自定义的存储与身份实现。

use async_trait::async_trait;
use authgate::error::StorageError;
use authgate::{
    AuthConfig, AuthService, Credential, Error, InMemoryTokenStore, InMemoryUserStore,
    SecretVerifier, ServerIdentityProvider, SessionToken, StatusClass, TokenStore, User,
    UserDetail, UserQuery, UserStore,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

const SIGNING_SECRET: &str = "integration-secret-at-least-32-bytes";

/// 始终失败的存储
struct UnavailableStore;

fn unavailable() -> Error {
    Error::Storage(StorageError::ConnectionFailed("database unreachable".into()))
}

#[async_trait]
impl UserStore for UnavailableStore {
    async fn upsert_user(&self, _user: &User) -> authgate::Result<()> {
        Err(unavailable())
    }

    async fn find_user(&self, _query: &UserQuery) -> authgate::Result<Option<User>> {
        Err(unavailable())
    }

    async fn find_users(&self, _query: &UserQuery) -> authgate::Result<Vec<User>> {
        Err(unavailable())
    }

    async fn remove_user(&self, _user: &User) -> authgate::Result<()> {
        Err(unavailable())
    }

    async fn ping(&self) -> authgate::Result<()> {
        Err(unavailable())
    }
}

#[async_trait]
impl TokenStore for UnavailableStore {
    async fn add_token(&self, _token: &SessionToken) -> authgate::Result<()> {
        Err(unavailable())
    }

    async fn find_token(&self, _token: &str) -> authgate::Result<Option<SessionToken>> {
        Err(unavailable())
    }

    async fn remove_token(&self, _token: &SessionToken) -> authgate::Result<()> {
        Err(unavailable())
    }
}

fn config() -> AuthConfig {
    AuthConfig::new()
        .with_signing_secret(SIGNING_SECRET)
        .with_server("uploader", "uploader-secret")
}

fn alice() -> Arc<InMemoryUserStore> {
    Arc::new(InMemoryUserStore::with_users([User::new(
        "u1",
        "alice",
        "correct-secret",
    )]))
}

/// 测试用户存储故障返回存储错误而不是 Unauthorized
#[tokio::test]
async fn test_user_store_failure_is_store_error() {
    let service = AuthService::new(
        config(),
        Arc::new(UnavailableStore),
        Arc::new(InMemoryTokenStore::new()),
    )
    .unwrap();

    let err = service
        .login(&Credential::new("alice", "correct-secret").to_authorization())
        .await
        .unwrap_err();
    assert_eq!(err.status_class(), StatusClass::StoreError);
    assert_eq!(err.status_class().http_status(), 503);
    assert!(err.is_retryable());
    assert!(!err.is_unauthorized());

    // 格式错误的请求在访问存储之前就被拒绝
    let err = service.login("").await.unwrap_err();
    assert_eq!(err.status_class(), StatusClass::BadRequest);
}

/// 测试 token 存储写入失败时登录失败
#[tokio::test]
async fn test_token_store_failure_fails_issuance() {
    let service = AuthService::new(config(), alice(), Arc::new(UnavailableStore)).unwrap();

    let err = service
        .login(&Credential::new("alice", "correct-secret").to_authorization())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Storage(StorageError::ConnectionFailed(_))));

    let err = service
        .server_login("uploader", "uploader-secret")
        .await
        .unwrap_err();
    assert_eq!(err.status_class(), StatusClass::StoreError);

    // 错误的凭据仍然是 Unauthorized，不会触及 token 存储
    let err = service
        .server_login("uploader", "wrong")
        .await
        .unwrap_err();
    assert!(err.is_unauthorized());
}

/// 测试授权检查只在要求存储中的 token 时读取存储
#[tokio::test]
async fn test_authorize_reads_store_only_when_required() {
    let stateless = AuthService::new(config(), alice(), Arc::new(UnavailableStore)).unwrap();
    let token = stateless
        .codec()
        .create(authgate::TokenData::user("u1", 3600))
        .unwrap();
    assert!(stateless.authorize(&token.token, false).await.is_ok());

    let stateful = AuthService::new(
        config().with_required_stored_token(true),
        alice(),
        Arc::new(UnavailableStore),
    )
    .unwrap();
    let err = stateful.authorize(&token.token, false).await.unwrap_err();
    assert_eq!(err.status_class(), StatusClass::StoreError);

    // 无效 token 在读取存储之前就被拒绝
    let err = stateful.authorize("garbage", false).await.unwrap_err();
    assert!(err.is_unauthorized());
}

/// 测试刷新时写入失败
#[tokio::test]
async fn test_refresh_failure_propagates() {
    let service = AuthService::new(config(), alice(), Arc::new(UnavailableStore)).unwrap();
    let token = service
        .codec()
        .create(authgate::TokenData::user("u1", 3600))
        .unwrap();

    let err = service.refresh_session(&token.token).await.unwrap_err();
    assert!(err.is_retryable());
}

/// 测试用户资料操作的存储故障
#[tokio::test]
async fn test_user_profile_store_failures() {
    let service = AuthService::new(
        config(),
        Arc::new(UnavailableStore),
        Arc::new(InMemoryTokenStore::new()),
    )
    .unwrap();
    let server = service
        .server_login("uploader", "uploader-secret")
        .await
        .unwrap();

    let err = service
        .create_user(UserDetail::new("u3", "carol").unwrap())
        .await
        .unwrap_err();
    assert_eq!(err.status_class(), StatusClass::StoreError);

    let err = service
        .update_user(&server.token, UserDetail::by_id("u1").unwrap())
        .await
        .unwrap_err();
    assert_eq!(err.status_class(), StatusClass::StoreError);

    let err = service
        .get_user_info(&server.token, UserDetail::by_id("u1").unwrap())
        .await
        .unwrap_err();
    assert!(err.is_retryable());

    // 校验失败先于存储访问
    let err = service
        .create_user(UserDetail::by_id("u3").unwrap())
        .await
        .unwrap_err();
    assert_eq!(err.status_class(), StatusClass::BadRequest);
}

/// 记录调用次数的服务器身份
struct CountingIdentities {
    calls: AtomicUsize,
}

impl ServerIdentityProvider for CountingIdentities {
    fn verify(&self, server_name: &str, server_secret: &str) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        server_name == "external" && server_secret == "external-secret"
    }
}

/// 前缀为 `plain:` 的存储格式
struct PrefixedVerifier;

impl SecretVerifier for PrefixedVerifier {
    fn verify(&self, presented: &str, stored: &str) -> bool {
        stored.strip_prefix("plain:") == Some(presented)
    }
}

/// 测试替换服务器身份与用户密钥校验
#[tokio::test]
async fn test_custom_identity_and_verifier() {
    let identities = Arc::new(CountingIdentities {
        calls: AtomicUsize::new(0),
    });
    let users = Arc::new(InMemoryUserStore::with_users([User::new(
        "u1",
        "alice",
        "plain:correct-secret",
    )]));

    let service = AuthService::new(config(), users, Arc::new(InMemoryTokenStore::new()))
        .unwrap()
        .with_server_identities(identities.clone())
        .with_secret_verifier(Arc::new(PrefixedVerifier));

    let server = service
        .server_login("external", "external-secret")
        .await
        .unwrap();
    assert_eq!(server.subject_id(), "external");

    // 配置中的服务器已被替换
    assert!(
        service
            .server_login("uploader", "uploader-secret")
            .await
            .is_err()
    );
    assert_eq!(identities.calls.load(Ordering::SeqCst), 2);

    let login = service
        .login(&Credential::new("alice", "correct-secret").to_authorization())
        .await
        .unwrap();
    assert_eq!(login.user.id, "u1");
}

/// 测试存储的健康检查
#[tokio::test]
async fn test_store_ping() {
    assert!(InMemoryUserStore::new().ping().await.is_ok());
    assert!(InMemoryTokenStore::new().ping().await.is_ok());

    assert!(UserStore::ping(&UnavailableStore).await.is_err());
    // 未覆盖的默认实现
    assert!(TokenStore::ping(&UnavailableStore).await.is_ok());
}
