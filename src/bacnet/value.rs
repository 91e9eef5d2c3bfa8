// BACnet プロパティ値
// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: 2025 Akihiro Yamamoto <github.com/ak1211>
//
use crate::bacnet::ObjectIdentifier;
use std::fmt;

#[derive(Clone, PartialEq, Debug)]
pub enum Value {
    Null,
    Boolean(bool),
    Unsigned(u64),
    Signed(i64),
    Real(f32),
    Double(f64),
    CharacterString(String),
    Enumerated(u32),
    ObjectIdentifier(ObjectIdentifier),
    /// 値が複数(配列、リスト)
    List(Vec<Value>),
}

impl Value {
    /// 値を文字列にする。取れなかったときは空文字
    pub fn text(&self) -> String {
        match self {
            Value::Null => String::new(),
            v => v.to_string(),
        }
    }

    pub fn as_unsigned(&self) -> Option<u64> {
        match self {
            Value::Unsigned(n) => Some(*n),
            Value::Enumerated(n) => Some(*n as u64),
            _ => None,
        }
    }

    /// 1個でも複数でもリストとして扱う
    pub fn into_list(self) -> Vec<Value> {
        match self {
            Value::List(xs) => xs,
            v => vec![v],
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Unsigned(n) => write!(f, "{n}"),
            Value::Signed(n) => write!(f, "{n}"),
            Value::Real(x) => write!(f, "{x}"),
            Value::Double(x) => write!(f, "{x}"),
            Value::CharacterString(s) => write!(f, "{s}"),
            Value::Enumerated(n) => write!(f, "{n}"),
            Value::ObjectIdentifier(oid) => write!(f, "{oid}"),
            Value::List(xs) => write!(
                f,
                "[{}]",
                xs.iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<String>>()
                    .join(", ")
            ),
        }
    }
}

#[test]
fn test1() {
    assert_eq!(Value::Real(21.5).text(), "21.5");
    assert_eq!(Value::Null.text(), "");
    assert_eq!(
        Value::CharacterString("AHU-1".to_string()).text(),
        "AHU-1"
    );
    assert_eq!(
        Value::List(vec![Value::Unsigned(1), Value::Unsigned(2)]).to_string(),
        "[1, 2]"
    );
    assert_eq!(
        Value::ObjectIdentifier(ObjectIdentifier::device(1001)).to_string(),
        "device:1001"
    );
}
