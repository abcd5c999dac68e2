//! 缓存键模块
//! 由命名空间、调用方身份和调用参数拼出确定性的存储键

use std::collections::BTreeMap;
use std::fmt;

pub mod rate_limit_keys;

pub use rate_limit_keys::{RATE_LIMIT_NAMESPACE, rate_limit_key};

/// 键各段之间的分隔符
pub const SEPARATOR: char = ':';

const ESCAPE: char = '\\';
// 关键字参数段内部使用的符号，和分隔符一样需要转义
const PAIR_JOIN: char = ',';
const PAIR_ASSIGN: char = '=';

/// 存储键
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(String);

impl Key {
    /// 以命名空间开始构建一个键
    pub fn builder(namespace: impl fmt::Display) -> KeyBuilder {
        KeyBuilder::new(namespace)
    }

    /// 只有命名空间、没有参数的键
    pub fn namespace(namespace: impl fmt::Display) -> Self {
        KeyBuilder::new(namespace).build()
    }

    /// 直接使用已经编码好的键或前缀，不做转义
    pub fn raw(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// 判断 `self` 是否落在前缀 `prefix` 之下
    pub fn starts_with(&self, prefix: &Key) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Key {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// 键构建器
///
/// 位置参数按调用顺序拼接；关键字参数先按名字排序再渲染，
/// 所以参数顺序不同但语义相同的调用得到同一个键。
/// 任何原始片段中的 `\ : , =` 都会被转义，不同的逻辑调用不会拼出同一个串。
#[derive(Debug, Clone)]
pub struct KeyBuilder {
    buf: String,
    kwargs: BTreeMap<String, String>,
}

impl KeyBuilder {
    pub fn new(namespace: impl fmt::Display) -> Self {
        let mut buf = String::new();
        push_escaped(&mut buf, &namespace.to_string());
        Self {
            buf,
            kwargs: BTreeMap::new(),
        }
    }

    /// 追加一个位置参数
    pub fn part(mut self, part: impl fmt::Display) -> Self {
        self.buf.push(SEPARATOR);
        push_escaped(&mut self.buf, &part.to_string());
        self
    }

    /// 依次追加多个位置参数
    pub fn parts<I, P>(self, parts: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: fmt::Display,
    {
        parts.into_iter().fold(self, |builder, part| builder.part(part))
    }

    /// 追加一个关键字参数，同名参数后写的覆盖先写的
    pub fn kwarg(mut self, name: impl fmt::Display, value: impl fmt::Display) -> Self {
        self.kwargs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn build(self) -> Key {
        let mut buf = self.buf;
        if !self.kwargs.is_empty() {
            buf.push(SEPARATOR);
            for (i, (name, value)) in self.kwargs.iter().enumerate() {
                if i > 0 {
                    buf.push(PAIR_JOIN);
                }
                push_escaped(&mut buf, name);
                buf.push(PAIR_ASSIGN);
                push_escaped(&mut buf, value);
            }
        }
        Key(buf)
    }

    /// 生成用于失效的前缀，末尾带分隔符，`user:1:` 不会误伤 `user:10`
    pub fn build_prefix(self) -> Key {
        let mut key = self.build();
        key.0.push(SEPARATOR);
        key
    }
}

fn push_escaped(buf: &mut String, raw: &str) {
    for c in raw.chars() {
        if matches!(c, ESCAPE | SEPARATOR | PAIR_JOIN | PAIR_ASSIGN) {
            buf.push(ESCAPE);
        }
        buf.push(c);
    }
}
