//! Shader parameter values and stacks
//!
//! A [`ShaderVarStack`] is the parameter set for one (context, physical
//! sub-layer, mesh) slot. It is built by pushing material values, then mesh
//! values, then light values; a later push with the same name replaces the
//! earlier value.

use std::borrow::Cow;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use crate::foundation::math::{Mat4, Vec3, Vec4};

/// Parameter name
pub type ShaderVarName = Cow<'static, str>;

/// Well-known parameter names written by the batcher
pub mod names {
    /// Number of lights bound to the pass (int)
    pub const LIGHT_COUNT: &str = "light count";
    /// Index of the pass within its logical layer (int)
    pub const PASS_NUMBER: &str = "pass number";
    /// Type shared by every light in the pass (int)
    pub const LIGHT_TYPE: &str = "light type";

    /// Per-light world position (array)
    pub const LIGHT_POSITION: &str = "light position";
    /// Per-light direction (array)
    pub const LIGHT_DIRECTION: &str = "light direction";
    /// Per-light diffuse colour times intensity (array)
    pub const LIGHT_DIFFUSE: &str = "light diffuse";
    /// Per-light range and attenuation factors (array)
    pub const LIGHT_ATTENUATION: &str = "light attenuation";
    /// Per-light cosines of the inner and outer cone (array)
    pub const LIGHT_FALLOFF: &str = "light falloff";

    /// Per-light shadow map (array)
    pub const LIGHT_SHADOW_MAP: &str = "light shadow map";
    /// Per-light shadow view-projection (array)
    pub const LIGHT_SHADOW_PROJECTION: &str = "light shadow map projection";
    /// Near and far view depth of the cascade a sub-layer renders (vec4)
    pub const CASCADE_RANGE: &str = "shadow cascade range";
}

/// A single parameter value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShaderValue {
    /// Integer
    Int(i32),
    /// Scalar
    Float(f32),
    /// 3-component vector
    Vec3(Vec3),
    /// 4-component vector
    Vec4(Vec4),
    /// 4x4 matrix
    Mat4(Mat4),
    /// Opaque texture handle
    Texture(u64),
}

impl ShaderValue {
    /// Integer payload, if this is an integer
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    fn hash_bits<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::Int(v) => (0u8, *v).hash(state),
            Self::Float(v) => (1u8, v.to_bits()).hash(state),
            Self::Vec3(v) => {
                2u8.hash(state);
                v.iter().for_each(|c| c.to_bits().hash(state));
            }
            Self::Vec4(v) => {
                3u8.hash(state);
                v.iter().for_each(|c| c.to_bits().hash(state));
            }
            Self::Mat4(m) => {
                4u8.hash(state);
                m.iter().for_each(|c| c.to_bits().hash(state));
            }
            Self::Texture(t) => (5u8, *t).hash(state),
        }
    }
}

impl From<i32> for ShaderValue {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<f32> for ShaderValue {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<Vec3> for ShaderValue {
    fn from(v: Vec3) -> Self {
        Self::Vec3(v)
    }
}

impl From<Vec4> for ShaderValue {
    fn from(v: Vec4) -> Self {
        Self::Vec4(v)
    }
}

impl From<Mat4> for ShaderValue {
    fn from(v: Mat4) -> Self {
        Self::Mat4(v)
    }
}

/// Name to value mapping with override semantics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShaderVarStack {
    values: HashMap<ShaderVarName, ShaderValue>,
    arrays: HashMap<ShaderVarName, Vec<Option<ShaderValue>>>,
}

impl ShaderVarStack {
    /// Create an empty stack
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a value, shadowing any earlier value of the same name
    pub fn push(&mut self, name: impl Into<ShaderVarName>, value: impl Into<ShaderValue>) {
        self.values.insert(name.into(), value.into());
    }

    /// Builder form of [`push`](Self::push)
    pub fn with(mut self, name: impl Into<ShaderVarName>, value: impl Into<ShaderValue>) -> Self {
        self.push(name, value);
        self
    }

    /// Set one element of an array parameter, growing the array as needed
    pub fn push_array_item(
        &mut self,
        name: impl Into<ShaderVarName>,
        index: usize,
        value: impl Into<ShaderValue>,
    ) {
        let items = self.arrays.entry(name.into()).or_default();
        if items.len() <= index {
            items.resize(index + 1, None);
        }
        items[index] = Some(value.into());
    }

    /// Push every value of `other` on top of this stack
    pub fn merge(&mut self, other: &Self) {
        for (name, value) in &other.values {
            self.values.insert(name.clone(), *value);
        }
        for (name, items) in &other.arrays {
            for (index, item) in items.iter().enumerate() {
                if let Some(value) = item {
                    self.push_array_item(name.clone(), index, *value);
                }
            }
        }
    }

    /// Look up a value
    pub fn get(&self, name: &str) -> Option<&ShaderValue> {
        self.values.get(name)
    }

    /// Look up an integer value
    pub fn get_int(&self, name: &str) -> Option<i32> {
        self.get(name).and_then(ShaderValue::as_int)
    }

    /// Look up one element of an array parameter
    pub fn get_array_item(&self, name: &str, index: usize) -> Option<&ShaderValue> {
        self.arrays.get(name)?.get(index)?.as_ref()
    }

    /// Number of elements an array parameter currently spans
    pub fn array_len(&self, name: &str) -> usize {
        self.arrays.get(name).map_or(0, Vec::len)
    }

    /// Remove everything
    pub fn clear(&mut self) {
        self.values.clear();
        self.arrays.clear();
    }

    /// Whether nothing has been pushed
    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.arrays.is_empty()
    }

    /// Order-independent hash of the parameter set, used to derive dispatch tickets
    pub fn fingerprint(&self) -> u64 {
        let mut names: Vec<&ShaderVarName> = self.values.keys().collect();
        names.sort();
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        for name in names {
            name.hash(&mut hasher);
            self.values[name].hash_bits(&mut hasher);
        }

        let mut array_names: Vec<&ShaderVarName> = self.arrays.keys().collect();
        array_names.sort();
        for name in array_names {
            name.hash(&mut hasher);
            for item in &self.arrays[name] {
                match item {
                    Some(value) => value.hash_bits(&mut hasher),
                    None => 0xffu8.hash(&mut hasher),
                }
            }
        }
        hasher.finish()
    }
}
