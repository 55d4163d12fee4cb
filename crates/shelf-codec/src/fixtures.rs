//! Types shared by the codec tests.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::error::{CodecError, CodecResult};
use crate::record::{read_into, Field, Record};
use crate::{persist_enum, persist_record, persist_union, persist_via_record};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Tier {
    #[default]
    Free,
    Pro,
}

persist_enum!(Tier as "Tier" { Free, Pro });

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Address {
    pub street: String,
    pub zip: u32,
}

persist_record!(Address { street, zip });

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Person {
    pub id: String,
    pub name: String,
    pub age: u8,
    pub tier: Tier,
    pub address: Option<Address>,
    pub tags: Vec<String>,
}

persist_record!(Person as "Person" { id, name, age, tier, address, tags });

/// An older writer of `Person`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PersonV0 {
    pub id: String,
    pub name: String,
}

persist_record!(PersonV0 as "Person" { id, name });

/// A newer writer of `Person` with fields the current one lacks.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PersonV2 {
    pub id: String,
    pub name: String,
    pub nickname: String,
    pub friends: Vec<Person>,
    pub age: u8,
}

persist_record!(PersonV2 as "Person" { id, name, nickname, friends, age });

#[derive(Debug, Default)]
pub struct Node {
    pub label: String,
    pub next: Option<Rc<RefCell<Node>>>,
    pub prev: Option<Weak<RefCell<Node>>>,
}

persist_record!(Node as "Node" { label, next, prev });

#[derive(Debug, Default)]
pub struct Holder {
    pub name: String,
    pub node: Option<Rc<RefCell<Node>>>,
}

persist_record!(Holder as "Holder" { name, node });

/// A record with a computed, fallible field.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Temperature {
    pub celsius: f64,
}

impl Temperature {
    fn fahrenheit(&self) -> CodecResult<f64> {
        if self.celsius.is_nan() {
            return Err(CodecError::Field {
                field: "fahrenheit".into(),
                reason: "no reading".into(),
            });
        }
        Ok(self.celsius * 9.0 / 5.0 + 32.0)
    }
}

impl Record for Temperature {
    const TYPE_NAME: &'static str = "Temperature";

    fn fields() -> &'static [Field<Self>] {
        const FIELDS: &[Field<Temperature>] = &[
            Field::<Temperature>::new(
                "celsius",
                |t, enc| enc.write_value(&t.celsius),
                |t, dec| read_into(&mut t.celsius, dec),
            ),
            Field::<Temperature>::read_only("fahrenheit", |t, enc| {
                enc.write_value(&t.fahrenheit()?)
            }),
        ];
        FIELDS
    }
}

persist_via_record!(Temperature);

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Circle {
    pub radius: u32,
}

persist_record!(Circle { radius });

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Square {
    pub side: u32,
}

persist_record!(Square { side });

#[derive(Clone, Debug, PartialEq)]
pub enum Shape {
    Circle(Circle),
    Square(Square),
}

impl Default for Shape {
    fn default() -> Self {
        Self::Circle(Circle::default())
    }
}

persist_union!(Shape as "Shape" { Circle(Circle), Square(Square) });
