//! 认证服务模块
//!
//! 编排登录、服务器登录、刷新与授权，组合 [`TokenCodec`]、[`SessionPolicy`]
//! 以及外部的 [`UserStore`] / [`TokenStore`]。
//!
//! 服务自身不持有可变的会话状态，所有持久状态都在存储中；
//! 失败只返回给当前调用方。
//!
//! 用户资料操作（[`AuthService::create_user`]、[`AuthService::update_user`]、
//! [`AuthService::get_user_info`]）接受已校验的 [`UserDetail`]。
//!
//! ## 示例
//!
//! ```rust
//! use authgate::{AuthConfig, AuthService, Credential, InMemoryTokenStore, InMemoryUserStore, User};
//! use std::sync::Arc;
//!
//! # tokio_test_block(async {
//! let users = Arc::new(InMemoryUserStore::with_users([
//!     User::new("u1", "alice", "correct-secret"),
//! ]));
//! let tokens = Arc::new(InMemoryTokenStore::new());
//! let config = AuthConfig::new().with_signing_secret("my-secret-key-at-least-32-bytes!");
//! let service = AuthService::new(config, users, tokens).unwrap();
//!
//! let header = Credential::new("alice", "correct-secret").to_authorization();
//! let login = service.login(&header).await.unwrap();
//! assert_eq!(login.user.id, "u1");
//!
//! let admitted = service.authorize(&login.token.token, false).await.unwrap();
//! assert_eq!(admitted.subject_id(), "u1");
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use tracing::{info, warn};

use crate::config::AuthConfig;
use crate::credential::{Credential, extract_credential};
use crate::error::{Error, Result, ValidationError};
use crate::identity::{ConstantTimeSecretVerifier, SecretVerifier, ServerIdentityProvider};
use crate::random::constant_time_compare_str;
use crate::store::{TokenStore, User, UserQuery, UserStore};
use crate::token::{RenewDecision, SessionPolicy, SessionToken, TokenCodec, TokenData};

/// 用户不存在时参与比较的占位密钥
const DUMMY_USER_SECRET: &str = "authgate-unknown-user-placeholder-secret";

/// 已校验的用户登录请求
#[derive(Debug, Clone)]
pub struct LoginRequest {
    credential: Credential,
}

impl LoginRequest {
    /// 从凭据创建请求
    ///
    /// 用户名或密钥为空时返回 `BadRequest`。
    pub fn new(credential: Credential) -> Result<Self> {
        if credential.name.is_empty() {
            return Err(ValidationError::EmptyField("name".into()).into());
        }
        if credential.secret.is_empty() {
            return Err(ValidationError::EmptyField("secret".into()).into());
        }
        Ok(Self { credential })
    }

    /// 从认证头解析并校验请求
    pub fn from_authorization(header: &str) -> Result<Self> {
        Self::new(extract_credential(header)?)
    }

    /// 用户名
    pub fn name(&self) -> &str {
        &self.credential.name
    }
}

/// 已校验的服务器登录请求
#[derive(Clone)]
pub struct ServerLoginRequest {
    name: String,
    secret: String,
}

impl ServerLoginRequest {
    /// 创建请求，名称或密钥为空时返回 `BadRequest`
    pub fn new(name: impl Into<String>, secret: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let secret = secret.into();
        if name.is_empty() {
            return Err(ValidationError::EmptyField("server name".into()).into());
        }
        if secret.is_empty() {
            return Err(ValidationError::EmptyField("server secret".into()).into());
        }
        Ok(Self { name, secret })
    }

    /// 服务器名
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for ServerLoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerLoginRequest")
            .field("name", &self.name)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// 已校验的用户资料请求
///
/// 由查询参数中的用户 ID 与可选的 JSON 请求体组合而成，查询参数中的 ID 优先。
/// ID 与用户名都为空时返回 `BadRequest`。
///
/// ```rust
/// use authgate::UserDetail;
///
/// let detail = UserDetail::from_request(Some("u1"), br#"{"name":"alice","team":"infra"}"#).unwrap();
/// assert_eq!(detail.id(), "u1");
/// assert_eq!(detail.name(), "alice");
///
/// assert!(UserDetail::from_request(None, b"").is_err());
/// ```
#[derive(Clone, PartialEq)]
pub struct UserDetail {
    id: String,
    name: String,
    secret: String,
    profile: HashMap<String, Value>,
}

impl UserDetail {
    /// 按 ID 与用户名创建
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Result<Self> {
        Self {
            id: id.into(),
            name: name.into(),
            secret: String::new(),
            profile: HashMap::new(),
        }
        .validated()
    }

    /// 只按用户 ID 创建
    pub fn by_id(id: impl Into<String>) -> Result<Self> {
        Self::new(id, "")
    }

    /// 从查询参数 ID 与请求体创建
    ///
    /// 请求体为空白时忽略；否则必须是 JSON 对象，`id`、`name`、`secret`
    /// 必须是字符串，其余字段作为资料保存。
    pub fn from_request(query_id: Option<&str>, body: &[u8]) -> Result<Self> {
        let mut detail = Self {
            id: String::new(),
            name: String::new(),
            secret: String::new(),
            profile: HashMap::new(),
        };

        if !body.trim_ascii().is_empty() {
            let fields: serde_json::Map<String, Value> = serde_json::from_slice(body)
                .map_err(|e| ValidationError::MalformedBody(e.to_string()))?;
            for (key, value) in fields {
                match key.as_str() {
                    "id" => detail.id = string_field("id", value)?,
                    "name" => detail.name = string_field("name", value)?,
                    "secret" => detail.secret = string_field("secret", value)?,
                    _ => {
                        detail.profile.insert(key, value);
                    }
                }
            }
        }

        if let Some(id) = query_id.filter(|id| !id.is_empty()) {
            detail.id = id.to_string();
        }

        detail.validated()
    }

    /// 设置密钥
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = secret.into();
        self
    }

    /// 设置资料字段
    pub fn with_profile(mut self, key: impl Into<String>, value: Value) -> Self {
        self.profile.insert(key.into(), value);
        self
    }

    /// 用户 ID，可能为空
    pub fn id(&self) -> &str {
        &self.id
    }

    /// 用户名，可能为空
    pub fn name(&self) -> &str {
        &self.name
    }

    fn validated(self) -> Result<Self> {
        if self.id.is_empty() && self.name.is_empty() {
            return Err(ValidationError::EmptyField("user id or name".into()).into());
        }
        Ok(self)
    }

    fn require_id(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(ValidationError::EmptyField("user id".into()).into());
        }
        Ok(())
    }

    fn query(&self) -> UserQuery {
        if self.id.is_empty() {
            UserQuery::by_name(&self.name)
        } else {
            UserQuery::by_id(&self.id)
        }
    }

    fn into_user(self) -> User {
        User {
            id: self.id,
            name: self.name,
            secret: self.secret,
            profile: self.profile,
        }
    }

    /// 合并到已有记录，空字段保持原值
    fn merge_into(self, mut existing: User) -> User {
        if !self.name.is_empty() {
            existing.name = self.name;
        }
        if !self.secret.is_empty() {
            existing.secret = self.secret;
        }
        existing.profile.extend(self.profile);
        existing
    }
}

impl fmt::Debug for UserDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserDetail")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("profile", &self.profile)
            .finish_non_exhaustive()
    }
}

fn string_field(key: &str, value: Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s),
        _ => Err(ValidationError::MalformedBody(format!("'{}' must be a string", key)).into()),
    }
}

/// 用户登录结果
#[derive(Debug, Clone)]
pub struct LoginResponse {
    /// 登录的用户（不含密钥）
    pub user: User,
    /// 新签发的 token
    pub token: SessionToken,
}

/// 刷新结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Refreshed {
    /// 长期 token，原样返回
    PassThrough(SessionToken),
    /// 新签发的 token
    Reissued(SessionToken),
}

impl Refreshed {
    /// 应返回给调用方的 token
    pub fn token(&self) -> &SessionToken {
        match self {
            Refreshed::PassThrough(token) | Refreshed::Reissued(token) => token,
        }
    }

    /// 取出 token
    pub fn into_token(self) -> SessionToken {
        match self {
            Refreshed::PassThrough(token) | Refreshed::Reissued(token) => token,
        }
    }

    /// Token 的主体
    pub fn subject_id(&self) -> &str {
        self.token().subject_id()
    }

    /// 是否签发了新 token
    pub fn is_reissued(&self) -> bool {
        matches!(self, Refreshed::Reissued(_))
    }
}

/// 认证服务
pub struct AuthService {
    codec: TokenCodec,
    policy: SessionPolicy,
    users: Arc<dyn UserStore>,
    tokens: Arc<dyn TokenStore>,
    servers: Arc<dyn ServerIdentityProvider>,
    secrets: Arc<dyn SecretVerifier>,
    long_term_key: Option<String>,
    require_stored_token: bool,
}

impl fmt::Debug for AuthService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthService")
            .field("policy", &self.policy)
            .field("long_term_enabled", &self.long_term_key.is_some())
            .field("require_stored_token", &self.require_stored_token)
            .finish_non_exhaustive()
    }
}

impl AuthService {
    /// 创建认证服务
    ///
    /// 服务器身份取自配置中的 `servers`，用户密钥默认使用常量时间相等比较。
    ///
    /// # 错误
    ///
    /// 配置校验失败时返回 [`Error::Config`]
    pub fn new(
        config: AuthConfig,
        users: Arc<dyn UserStore>,
        tokens: Arc<dyn TokenStore>,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            codec: TokenCodec::new(config.signing_secret.as_bytes()),
            policy: config.policy(),
            users,
            tokens,
            servers: Arc::new(config.server_identities()),
            secrets: Arc::new(ConstantTimeSecretVerifier),
            long_term_key: config.long_term_key,
            require_stored_token: config.require_stored_token,
        })
    }

    /// 替换服务器身份提供者
    pub fn with_server_identities(mut self, servers: Arc<dyn ServerIdentityProvider>) -> Self {
        self.servers = servers;
        self
    }

    /// 替换用户密钥校验器
    pub fn with_secret_verifier(mut self, secrets: Arc<dyn SecretVerifier>) -> Self {
        self.secrets = secrets;
        self
    }

    /// Token 编解码器
    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Session 策略
    pub fn policy(&self) -> &SessionPolicy {
        &self.policy
    }

    /// 用户登录
    ///
    /// # 错误
    ///
    /// - 凭据缺失或格式错误：`BadRequest`
    /// - 用户不存在或密钥不匹配：`Unauthorized`（两者不做区分）
    /// - 存储失败：`Storage`
    pub async fn login(&self, authorization: &str) -> Result<LoginResponse> {
        let request = LoginRequest::from_authorization(authorization)?;
        self.login_with(request, false).await
    }

    /// 长期用户登录
    ///
    /// 提交的长期密钥与配置一致时，签发的 token 使用长期有效期，刷新时不会续期。
    pub async fn login_long_term(
        &self,
        authorization: &str,
        long_term_key: &str,
    ) -> Result<LoginResponse> {
        let request = LoginRequest::from_authorization(authorization)?;

        let key_matches = self
            .long_term_key
            .as_deref()
            .is_some_and(|expected| constant_time_compare_str(long_term_key, expected));
        if !key_matches {
            warn!(reason = "invalid_long_term_key", "login rejected");
            return Err(Error::Unauthorized);
        }

        self.login_with(request, true).await
    }

    /// 执行已校验的登录请求
    pub async fn login_with(&self, request: LoginRequest, long_term: bool) -> Result<LoginResponse> {
        let credential = request.credential;

        let found = self
            .users
            .find_user(&UserQuery::by_name(&credential.name))
            .await
            .inspect_err(|e| warn!(error = %e, "user lookup failed"))?;

        let user = match found {
            Some(user) if !user.id.is_empty() => {
                if !self.secrets.verify(&credential.secret, &user.secret) {
                    warn!(reason = "invalid_credentials", "login rejected");
                    return Err(Error::Unauthorized);
                }
                user
            }
            _ => {
                let _ = self.secrets.verify(&credential.secret, DUMMY_USER_SECRET);
                warn!(reason = "invalid_credentials", "login rejected");
                return Err(Error::Unauthorized);
            }
        };

        let data = if long_term {
            self.policy.long_term_user_token(&user.id)
        } else {
            self.policy.user_token(&user.id)
        };
        let token = self.issue(data).await?;

        info!(
            subject = %user.id,
            token_id = %token.token_id,
            long_term,
            "user logged in"
        );

        Ok(LoginResponse {
            user: user.without_secret(),
            token,
        })
    }

    /// 服务器登录
    ///
    /// # 错误
    ///
    /// - 名称或密钥为空：`BadRequest`
    /// - 名称与密钥不匹配：`Unauthorized`
    /// - 存储失败：`Storage`
    pub async fn server_login(&self, server_name: &str, server_secret: &str) -> Result<SessionToken> {
        let request = ServerLoginRequest::new(server_name, server_secret)?;

        if !self.servers.verify(&request.name, &request.secret) {
            warn!(
                server = %request.name,
                reason = "invalid_server_credentials",
                "server login rejected"
            );
            return Err(Error::Unauthorized);
        }

        let token = self.issue(self.policy.server_token(&request.name)).await?;
        info!(
            subject = %request.name,
            token_id = %token.token_id,
            "server logged in"
        );

        Ok(token)
    }

    /// 刷新 session
    ///
    /// 长期用户 token 原样返回，其他 token 以续期窗口重新签发并保存。
    pub async fn refresh_session(&self, presented: &str) -> Result<Refreshed> {
        let token = self.verified(presented).await?;

        match self.policy.should_renew(&token.data) {
            RenewDecision::PassThrough => {
                info!(
                    subject = %token.data.subject_id,
                    token_id = %token.token_id,
                    decision = "pass_through",
                    "session refreshed"
                );
                Ok(Refreshed::PassThrough(token))
            }
            RenewDecision::Reissue(data) => {
                let renewed = self.issue(data).await?;
                info!(
                    subject = %renewed.data.subject_id,
                    is_server = renewed.data.is_server,
                    previous_token_id = %token.token_id,
                    token_id = %renewed.token_id,
                    decision = "reissue",
                    "session refreshed"
                );
                Ok(Refreshed::Reissued(renewed))
            }
        }
    }

    /// 授权检查
    ///
    /// 返回被接受的 token；`require_server_role` 为真时只接受服务器 token。
    pub async fn authorize(&self, presented: &str, require_server_role: bool) -> Result<SessionToken> {
        let token = self.verified(presented).await?;

        if require_server_role && !token.data.is_server {
            warn!(
                subject = %token.data.subject_id,
                reason = "server_role_required",
                "authorization rejected"
            );
            return Err(Error::Unauthorized);
        }

        Ok(token)
    }

    /// 登出：验证 token 后从存储中删除
    pub async fn logout(&self, presented: &str) -> Result<()> {
        let token = self.verified(presented).await?;

        self.tokens
            .remove_token(&token)
            .await
            .inspect_err(|e| warn!(error = %e, "token removal failed"))?;

        info!(
            subject = %token.data.subject_id,
            token_id = %token.token_id,
            "session ended"
        );
        Ok(())
    }

    /// 服务器检查用户 token
    ///
    /// 调用方必须持有服务器 token，返回被检查 token 的声明。
    pub async fn server_check_token(&self, server_token: &str, user_token: &str) -> Result<TokenData> {
        self.authorize(server_token, true).await?;
        let checked = self.verified(user_token).await?;
        Ok(checked.data)
    }

    /// 创建用户
    ///
    /// 需要用户 ID 与用户名；ID 或用户名已被占用时返回 `BadRequest`。
    pub async fn create_user(&self, detail: UserDetail) -> Result<User> {
        detail.require_id()?;
        if detail.name.is_empty() {
            return Err(ValidationError::EmptyField("user name".into()).into());
        }

        let mut taken = false;
        for query in [UserQuery::by_id(&detail.id), UserQuery::by_name(&detail.name)] {
            let found = self
                .users
                .find_user(&query)
                .await
                .inspect_err(|e| warn!(error = %e, "user lookup failed"))?;
            taken |= found.is_some();
        }
        if taken {
            warn!(reason = "user_exists", "user creation rejected");
            return Err(Error::bad_request("user already exists"));
        }

        let user = detail.into_user();
        self.users
            .upsert_user(&user)
            .await
            .inspect_err(|e| warn!(error = %e, "user write failed"))?;

        info!(subject = %user.id, "user created");
        Ok(user.without_secret())
    }

    /// 更新用户资料
    ///
    /// 需要有效 token；用户 token 只能更新自己的记录，服务器 token 不受限制。
    /// 请求中为空的字段保持原值，记录不存在时返回 `None`。
    pub async fn update_user(&self, presented: &str, detail: UserDetail) -> Result<Option<User>> {
        detail.require_id()?;
        let caller = self.authorize(presented, false).await?;
        self.ensure_access(&caller, &detail.id)?;

        let existing = self
            .users
            .find_user(&UserQuery::by_id(&detail.id))
            .await
            .inspect_err(|e| warn!(error = %e, "user lookup failed"))?;
        let Some(existing) = existing else {
            return Ok(None);
        };

        let updated = detail.merge_into(existing);
        self.users
            .upsert_user(&updated)
            .await
            .inspect_err(|e| warn!(error = %e, "user write failed"))?;

        info!(
            subject = %updated.id,
            caller = %caller.data.subject_id,
            "user updated"
        );
        Ok(Some(updated.without_secret()))
    }

    /// 查询用户资料
    ///
    /// 按 ID（否则按用户名）查找，访问规则与 [`update_user`](Self::update_user) 相同。
    pub async fn get_user_info(&self, presented: &str, detail: UserDetail) -> Result<Option<User>> {
        let caller = self.authorize(presented, false).await?;

        let found = self
            .users
            .find_user(&detail.query())
            .await
            .inspect_err(|e| warn!(error = %e, "user lookup failed"))?;

        match found {
            Some(user) => {
                self.ensure_access(&caller, &user.id)?;
                Ok(Some(user.without_secret()))
            }
            None if caller.data.is_server => Ok(None),
            // 用户 token 查询不存在的记录与查询他人记录结果相同
            None => {
                warn!(reason = "not_owner", "user access rejected");
                Err(Error::Unauthorized)
            }
        }
    }

    fn ensure_access(&self, caller: &SessionToken, user_id: &str) -> Result<()> {
        if caller.data.is_server || caller.data.subject_id == user_id {
            return Ok(());
        }
        warn!(
            subject = %caller.data.subject_id,
            reason = "not_owner",
            "user access rejected"
        );
        Err(Error::Unauthorized)
    }

    async fn issue(&self, data: TokenData) -> Result<SessionToken> {
        let token = self.codec.create(data)?;

        self.tokens
            .add_token(&token)
            .await
            .inspect_err(|e| warn!(error = %e, "token persist failed"))?;

        Ok(token)
    }

    /// 解析并验证 token；签名、过期与存储检查的失败都折叠为 `Unauthorized`，
    /// 存储本身的故障原样返回
    async fn verified(&self, presented: &str) -> Result<SessionToken> {
        let Some(token) = TokenCodec::parse(presented) else {
            warn!(reason = "malformed_token", "token rejected");
            return Err(Error::Unauthorized);
        };

        if !self.codec.verify(&token) {
            warn!(
                token_id = %token.token_id,
                reason = "invalid_or_expired",
                "token rejected"
            );
            return Err(Error::Unauthorized);
        }

        if self.require_stored_token {
            let stored = self
                .tokens
                .find_token(&token.token)
                .await
                .inspect_err(|e| warn!(error = %e, "token lookup failed"))?;
            if stored.is_none() {
                warn!(
                    token_id = %token.token_id,
                    reason = "not_stored",
                    "token rejected"
                );
                return Err(Error::Unauthorized);
            }
        }

        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StatusClass;
    use crate::store::{InMemoryTokenStore, InMemoryUserStore};

    const SECRET: &str = "test-secret-key-must-be-32-bytes!";

    fn service() -> AuthService {
        let users = Arc::new(InMemoryUserStore::with_users([User::new(
            "u1",
            "alice",
            "correct-secret",
        )]));
        let config = AuthConfig::new()
            .with_signing_secret(SECRET)
            .with_server("uploader", "uploader-secret");
        AuthService::new(config, users, Arc::new(InMemoryTokenStore::new())).unwrap()
    }

    #[test]
    fn test_login_request_validation() {
        assert!(LoginRequest::new(Credential::new("alice", "pw")).is_ok());

        let empty_name = LoginRequest::new(Credential::new("", "pw")).unwrap_err();
        assert_eq!(empty_name.status_class(), StatusClass::BadRequest);

        let empty_secret = LoginRequest::from_authorization(
            &Credential::new("alice", "").to_authorization(),
        )
        .unwrap_err();
        assert_eq!(empty_secret.status_class(), StatusClass::BadRequest);

        let anonymous = LoginRequest::from_authorization("").unwrap_err();
        assert_eq!(anonymous.status_class(), StatusClass::BadRequest);
    }

    #[test]
    fn test_server_login_request_validation() {
        let request = ServerLoginRequest::new("uploader", "s").unwrap();
        assert_eq!(request.name(), "uploader");
        assert!(!format!("{:?}", request).contains("\"s\""));

        assert!(matches!(
            ServerLoginRequest::new("", "s"),
            Err(Error::BadRequest(_))
        ));
        assert!(matches!(
            ServerLoginRequest::new("uploader", ""),
            Err(Error::BadRequest(_))
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = AuthService::new(
            AuthConfig::new().with_signing_secret("short"),
            Arc::new(InMemoryUserStore::new()),
            Arc::new(InMemoryTokenStore::new()),
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_login_returns_user_without_secret() {
        let service = service();
        let header = Credential::new("alice", "correct-secret").to_authorization();

        let login = service.login(&header).await.unwrap();
        assert_eq!(login.user.id, "u1");
        assert!(login.user.secret.is_empty());
        assert_eq!(login.token.data, TokenData::user("u1", 3600));
    }

    #[tokio::test]
    async fn test_unknown_user_and_wrong_secret_are_indistinguishable() {
        let service = service();

        let wrong = service
            .login(&Credential::new("alice", "wrong").to_authorization())
            .await
            .unwrap_err();
        let unknown = service
            .login(&Credential::new("mallory", "correct-secret").to_authorization())
            .await
            .unwrap_err();

        assert!(wrong.is_unauthorized());
        assert!(unknown.is_unauthorized());
        assert_eq!(wrong.to_string(), unknown.to_string());
    }

    #[tokio::test]
    async fn test_long_term_login_disabled_without_key() {
        let service = service();
        let header = Credential::new("alice", "correct-secret").to_authorization();

        let result = service.login_long_term(&header, "anything").await;
        assert!(matches!(result, Err(Error::Unauthorized)));
    }

    #[tokio::test]
    async fn test_server_check_token() {
        let service = service();
        let user = service
            .login(&Credential::new("alice", "correct-secret").to_authorization())
            .await
            .unwrap();
        let server = service
            .server_login("uploader", "uploader-secret")
            .await
            .unwrap();

        let data = service
            .server_check_token(&server.token, &user.token.token)
            .await
            .unwrap();
        assert_eq!(data.subject_id, "u1");

        // 用户 token 不能用来检查其他 token
        let result = service
            .server_check_token(&user.token.token, &server.token)
            .await;
        assert!(matches!(result, Err(Error::Unauthorized)));
    }

    #[test]
    fn test_refreshed_accessors() {
        let codec = TokenCodec::new(SECRET);
        let token = codec.create(TokenData::user("u1", 3600)).unwrap();

        let passed = Refreshed::PassThrough(token.clone());
        assert!(!passed.is_reissued());
        assert_eq!(passed.subject_id(), "u1");

        let reissued = Refreshed::Reissued(token.clone());
        assert!(reissued.is_reissued());
        assert_eq!(reissued.into_token(), token);
    }

    #[test]
    fn test_user_detail_from_request() {
        let detail = UserDetail::from_request(
            Some("u9"),
            br#"{"id":"ignored","name":"carol","secret":"pw","team":"infra"}"#,
        )
        .unwrap();
        assert_eq!(detail.id(), "u9");
        assert_eq!(detail.name(), "carol");
        assert!(!format!("{:?}", detail).contains("\"pw\""));

        let user = detail.into_user();
        assert_eq!(user.secret, "pw");
        assert_eq!(user.profile["team"], "infra");
        assert!(!user.profile.contains_key("id"));

        // 只有查询参数
        let by_query = UserDetail::from_request(Some("u1"), b"  ").unwrap();
        assert_eq!(by_query.query(), UserQuery::by_id("u1"));

        // 只有请求体中的用户名
        let by_name = UserDetail::from_request(None, br#"{"name":"alice"}"#).unwrap();
        assert_eq!(by_name.query(), UserQuery::by_name("alice"));
    }

    #[test]
    fn test_user_detail_rejections() {
        let cases: [(Option<&str>, &[u8]); 5] = [
            (None, b""),
            (Some(""), b"{}"),
            (None, b"not json"),
            (None, b"[1, 2]"),
            (Some("u1"), br#"{"name": 42}"#),
        ];
        for (query_id, body) in cases {
            let err = UserDetail::from_request(query_id, body).unwrap_err();
            assert_eq!(err.status_class(), StatusClass::BadRequest);
        }

        assert!(UserDetail::new("", "").is_err());
        assert!(UserDetail::by_id("u1").is_ok());
        assert!(UserDetail::new("", "alice").unwrap().require_id().is_err());
    }

    #[test]
    fn test_user_detail_merge_keeps_unset_fields() {
        let existing = User::new("u1", "alice", "old-secret").with_profile("team", "infra");
        let merged = UserDetail::by_id("u1")
            .unwrap()
            .with_profile("title", serde_json::json!("lead"))
            .merge_into(existing);

        assert_eq!(merged.name, "alice");
        assert_eq!(merged.secret, "old-secret");
        assert_eq!(merged.profile["team"], "infra");
        assert_eq!(merged.profile["title"], "lead");
    }
}
