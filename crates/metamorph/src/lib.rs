//! Metamorph: shape-driven object mapping
//!
//! Metamorph converts values between shapes. A [`Mapper`] picks the best
//! [`Strategy`] for each (source, target) pair, falls back to member-by-member
//! structured mapping for records, and compiles the result into a reusable
//! [`Procedure`] the first time the pair is requested.
//!
//! ```
//! use metamorph::{Mapper, reflect_record};
//!
//! #[derive(Debug, Default, Clone, PartialEq)]
//! struct Order {
//!     id: u32,
//!     total: String,
//! }
//!
//! #[derive(Debug, Default, Clone, PartialEq)]
//! struct OrderRow {
//!     id: i64,
//!     total: f64,
//! }
//!
//! reflect_record!(Order { id: u32, total: String });
//! reflect_record!(OrderRow { id: i64, total: f64 });
//!
//! let mapper = Mapper::new();
//! let row: OrderRow = mapper
//!     .map(&Order { id: 7, total: "12.5".into() })
//!     .unwrap();
//! assert_eq!(row, OrderRow { id: 7, total: 12.5 });
//! ```

mod compiler;
mod convention;
mod error;
mod mapper;
mod oracle;
mod plan;
mod procedure;
mod profile;
mod reflect;
mod registry;
mod shape;
mod structured;
mod value;

pub mod strategy;

pub use compiler::ProcedureCache;
pub use convention::{
    Affixes, Convention, ConventionContext, Conventions, Correspondence, ExactName, MatchWith,
    NormalizedName, SameName, normalize,
};
pub use error::{MapError, Result};
pub use mapper::{Mapper, MapperBuilder, MapperStats};
pub use oracle::{derives_from, distance, find_conversion_operator};
pub use plan::{Directive, Hook, PlanBuilder, Recursion, StructuredPlan};
pub use procedure::{IntoFn, Procedure};
pub use profile::{ConventionSpec, MapperOptions, PairProfile, Profile};
pub use reflect::{Integral, Reflect};
pub use registry::{Registry, Resolution, Resolver};
pub use shape::{
    AppendFn, Capability, CollectionDef, Constructor, ConvertFn, EnumDef, FormatFn, IterateFn,
    MemberDescriptor, Operator, OperatorKind, ParseFn, RecordDef, Scalar, SequenceCtor, Shape,
    ShapeKind,
};
pub use strategy::{ConversionRequest, Strategy, Synthesizer};
pub use value::{EnumValue, NativeValue, Record, Value};
