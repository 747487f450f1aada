//! Typed, per-node parameter store.
//!
//! Every node owns a [`PropertyStore`]: a slot-indexed map of typed
//! [`Property`] values described by [`PropertyDescriptor`] metadata
//! (name, default, range, read-only, dynamic-range, modulatable).
//!
//! A float property can be evaluated two ways per block:
//!
//! - **k-rate**: one scalar for the whole block (the common case).
//! - **a-rate**: a per-sample buffer, used whenever the property has a
//!   connected audio modulator or an active linear ramp. With a ramp the
//!   buffer holds the ramped value; a connected modulator is added on top
//!   (sum, not replace), so modulation offsets whatever the ramp or scalar
//!   says.
//!
//! `tick()` runs once per block from the node tick: it advances ramp state
//! and prepares the per-sample buffer when one is needed.

use std::collections::BTreeMap;
use std::sync::Arc;

use resona_core::kernels;

use crate::buffer::AudioBuffer;
use crate::connection::EdgeId;
use crate::error::{Error, Result};

/// The type tag of a property.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PropertyType {
    Int,
    Float,
    Double,
    String,
    Float3,
    Float6,
    FloatArray,
    IntArray,
    Buffer,
}

/// A property's current (or default) value.
#[derive(Clone, Debug)]
pub enum PropertyValue {
    Int(i32),
    Float(f32),
    Double(f64),
    String(String),
    Float3([f32; 3]),
    Float6([f32; 6]),
    FloatArray(Vec<f32>),
    IntArray(Vec<i32>),
    Buffer(Option<Arc<AudioBuffer>>),
}

impl PropertyValue {
    pub fn property_type(&self) -> PropertyType {
        match self {
            PropertyValue::Int(_) => PropertyType::Int,
            PropertyValue::Float(_) => PropertyType::Float,
            PropertyValue::Double(_) => PropertyType::Double,
            PropertyValue::String(_) => PropertyType::String,
            PropertyValue::Float3(_) => PropertyType::Float3,
            PropertyValue::Float6(_) => PropertyType::Float6,
            PropertyValue::FloatArray(_) => PropertyType::FloatArray,
            PropertyValue::IntArray(_) => PropertyType::IntArray,
            PropertyValue::Buffer(_) => PropertyType::Buffer,
        }
    }
}

/// Static metadata for one property slot.
///
/// Built with the typed constructors and chained builders:
///
/// ```rust
/// use resona_engine::PropertyDescriptor;
///
/// let freq = PropertyDescriptor::float("frequency", 440.0, 0.0, 22050.0)
///     .modulatable()
///     .dynamic_range();
/// assert!(freq.modulatable);
/// ```
#[derive(Clone, Debug)]
pub struct PropertyDescriptor {
    /// Property name, for introspection.
    pub name: &'static str,
    /// Default (and initial) value; also fixes the type.
    pub default: PropertyValue,
    /// Lower bound for numeric writes.
    pub min: f64,
    /// Upper bound for numeric writes.
    pub max: f64,
    /// Smallest legal array length (array types only).
    pub min_length: usize,
    /// Largest legal array length (array types only).
    pub max_length: usize,
    /// Writes fail with `PropertyReadOnly`.
    pub read_only: bool,
    /// The range depends on the sample rate or another property.
    pub dynamic_range: bool,
    /// The property exposes a one-channel audio modulation input.
    pub modulatable: bool,
}

impl PropertyDescriptor {
    fn new(name: &'static str, default: PropertyValue) -> Self {
        Self {
            name,
            default,
            min: f64::NEG_INFINITY,
            max: f64::INFINITY,
            min_length: 0,
            max_length: usize::MAX,
            read_only: false,
            dynamic_range: false,
            modulatable: false,
        }
    }

    pub fn int(name: &'static str, default: i32, min: i32, max: i32) -> Self {
        let mut descriptor = Self::new(name, PropertyValue::Int(default));
        descriptor.min = min as f64;
        descriptor.max = max as f64;
        descriptor
    }

    pub fn float(name: &'static str, default: f32, min: f32, max: f32) -> Self {
        let mut descriptor = Self::new(name, PropertyValue::Float(default));
        descriptor.min = min as f64;
        descriptor.max = max as f64;
        descriptor
    }

    pub fn double(name: &'static str, default: f64, min: f64, max: f64) -> Self {
        let mut descriptor = Self::new(name, PropertyValue::Double(default));
        descriptor.min = min;
        descriptor.max = max;
        descriptor
    }

    pub fn string(name: &'static str, default: &str) -> Self {
        Self::new(name, PropertyValue::String(default.to_owned()))
    }

    pub fn float3(name: &'static str, default: [f32; 3]) -> Self {
        Self::new(name, PropertyValue::Float3(default))
    }

    pub fn float6(name: &'static str, default: [f32; 6]) -> Self {
        Self::new(name, PropertyValue::Float6(default))
    }

    pub fn float_array(
        name: &'static str,
        default: Vec<f32>,
        min_length: usize,
        max_length: usize,
    ) -> Self {
        let mut descriptor = Self::new(name, PropertyValue::FloatArray(default));
        descriptor.min_length = min_length;
        descriptor.max_length = max_length;
        descriptor
    }

    pub fn int_array(
        name: &'static str,
        default: Vec<i32>,
        min_length: usize,
        max_length: usize,
    ) -> Self {
        let mut descriptor = Self::new(name, PropertyValue::IntArray(default));
        descriptor.min_length = min_length;
        descriptor.max_length = max_length;
        descriptor
    }

    pub fn buffer(name: &'static str) -> Self {
        Self::new(name, PropertyValue::Buffer(None))
    }

    /// Mark the property read-only.
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Mark the range as dependent on the sample rate or another property.
    pub fn dynamic_range(mut self) -> Self {
        self.dynamic_range = true;
        self
    }

    /// Give the property a one-channel audio modulation input.
    /// Only meaningful for float properties.
    pub fn modulatable(mut self) -> Self {
        self.modulatable = true;
        self
    }

    pub fn property_type(&self) -> PropertyType {
        self.default.property_type()
    }
}

/// Active linear ramp state: constant per-sample increment, exact landing.
#[derive(Clone, Debug)]
struct Ramp {
    target: f32,
    increment: f32,
    remaining: usize,
}

/// Audio-rate modulation input: one channel of fan-in.
pub(crate) struct ModulationInput {
    pub incoming: Vec<EdgeId>,
    pub buffer: Vec<f32>,
}

/// One property slot: metadata, current value, and a-rate machinery.
pub struct Property {
    descriptor: PropertyDescriptor,
    value: PropertyValue,
    ramp: Option<Ramp>,
    pub(crate) modulation: Option<ModulationInput>,
    block_buffer: Vec<f32>,
    a_rate: bool,
    modified: bool,
}

impl Property {
    fn new(descriptor: PropertyDescriptor, block_size: usize) -> Self {
        let modulation = if descriptor.modulatable {
            Some(ModulationInput {
                incoming: Vec::new(),
                buffer: vec![0.0; block_size],
            })
        } else {
            None
        };
        Self {
            value: descriptor.default.clone(),
            descriptor,
            ramp: None,
            modulation,
            block_buffer: Vec::new(),
            a_rate: false,
            modified: false,
        }
    }

    pub fn descriptor(&self) -> &PropertyDescriptor {
        &self.descriptor
    }

    pub fn property_type(&self) -> PropertyType {
        self.value.property_type()
    }

    /// Whether this block must be evaluated per-sample.
    pub fn needs_a_rate(&self) -> bool {
        self.a_rate
    }

    /// Whether the property was written since the last block.
    pub fn was_modified(&self) -> bool {
        self.modified
    }

    fn check_type(&self, expected: PropertyType) -> Result<()> {
        if self.property_type() == expected {
            Ok(())
        } else {
            Err(Error::TypeMismatch)
        }
    }

    fn check_writable(&self) -> Result<()> {
        if self.descriptor.read_only {
            Err(Error::PropertyReadOnly)
        } else {
            Ok(())
        }
    }

    // --- Typed access ---

    pub fn get_int(&self) -> Result<i32> {
        match &self.value {
            PropertyValue::Int(v) => Ok(*v),
            _ => Err(Error::TypeMismatch),
        }
    }

    pub fn set_int(&mut self, value: i32) -> Result<()> {
        self.check_type(PropertyType::Int)?;
        self.check_writable()?;
        let clamped = (value as f64).clamp(self.descriptor.min, self.descriptor.max) as i32;
        self.value = PropertyValue::Int(clamped);
        self.modified = true;
        Ok(())
    }

    pub fn get_float(&self) -> Result<f32> {
        match &self.value {
            PropertyValue::Float(v) => Ok(*v),
            _ => Err(Error::TypeMismatch),
        }
    }

    pub fn set_float(&mut self, value: f32) -> Result<()> {
        self.check_type(PropertyType::Float)?;
        self.check_writable()?;
        let clamped = (value as f64).clamp(self.descriptor.min, self.descriptor.max) as f32;
        self.value = PropertyValue::Float(clamped);
        self.ramp = None;
        self.modified = true;
        Ok(())
    }

    /// Start a linear ramp from the current value to `target` over
    /// `seconds`. The property is a-rate until the ramp lands.
    pub fn linear_ramp(&mut self, target: f32, seconds: f32, sample_rate: f32) -> Result<()> {
        self.check_type(PropertyType::Float)?;
        self.check_writable()?;
        let target = (target as f64).clamp(self.descriptor.min, self.descriptor.max) as f32;
        let samples = ((seconds * sample_rate) as usize).max(1);
        let current = match self.value {
            PropertyValue::Float(v) => v,
            _ => unreachable!(),
        };
        self.ramp = Some(Ramp {
            target,
            increment: (target - current) / samples as f32,
            remaining: samples,
        });
        self.modified = true;
        Ok(())
    }

    pub fn get_double(&self) -> Result<f64> {
        match &self.value {
            PropertyValue::Double(v) => Ok(*v),
            _ => Err(Error::TypeMismatch),
        }
    }

    pub fn set_double(&mut self, value: f64) -> Result<()> {
        self.check_type(PropertyType::Double)?;
        self.check_writable()?;
        self.value = PropertyValue::Double(value.clamp(self.descriptor.min, self.descriptor.max));
        self.modified = true;
        Ok(())
    }

    pub fn get_string(&self) -> Result<String> {
        match &self.value {
            PropertyValue::String(v) => Ok(v.clone()),
            _ => Err(Error::TypeMismatch),
        }
    }

    pub fn set_string(&mut self, value: String) -> Result<()> {
        self.check_type(PropertyType::String)?;
        self.check_writable()?;
        self.value = PropertyValue::String(value);
        self.modified = true;
        Ok(())
    }

    pub fn get_float3(&self) -> Result<[f32; 3]> {
        match &self.value {
            PropertyValue::Float3(v) => Ok(*v),
            _ => Err(Error::TypeMismatch),
        }
    }

    pub fn set_float3(&mut self, value: [f32; 3]) -> Result<()> {
        self.check_type(PropertyType::Float3)?;
        self.check_writable()?;
        self.value = PropertyValue::Float3(value);
        self.modified = true;
        Ok(())
    }

    pub fn get_float6(&self) -> Result<[f32; 6]> {
        match &self.value {
            PropertyValue::Float6(v) => Ok(*v),
            _ => Err(Error::TypeMismatch),
        }
    }

    pub fn set_float6(&mut self, value: [f32; 6]) -> Result<()> {
        self.check_type(PropertyType::Float6)?;
        self.check_writable()?;
        self.value = PropertyValue::Float6(value);
        self.modified = true;
        Ok(())
    }

    pub fn get_buffer(&self) -> Result<Option<Arc<AudioBuffer>>> {
        match &self.value {
            PropertyValue::Buffer(v) => Ok(v.clone()),
            _ => Err(Error::TypeMismatch),
        }
    }

    pub fn set_buffer(&mut self, value: Option<Arc<AudioBuffer>>) -> Result<()> {
        self.check_type(PropertyType::Buffer)?;
        self.check_writable()?;
        self.value = PropertyValue::Buffer(value);
        self.modified = true;
        Ok(())
    }

    // --- Array access ---

    pub fn replace_float_array(&mut self, values: Vec<f32>) -> Result<()> {
        self.check_type(PropertyType::FloatArray)?;
        self.check_writable()?;
        if values.len() < self.descriptor.min_length || values.len() > self.descriptor.max_length {
            return Err(Error::Range);
        }
        self.value = PropertyValue::FloatArray(values);
        self.modified = true;
        Ok(())
    }

    pub fn read_float_array(&self, index: usize) -> Result<f32> {
        match &self.value {
            PropertyValue::FloatArray(v) => v.get(index).copied().ok_or(Error::Range),
            _ => Err(Error::TypeMismatch),
        }
    }

    /// Overwrite `[start, stop)` with `values`.
    pub fn write_float_array(&mut self, start: usize, stop: usize, values: &[f32]) -> Result<()> {
        self.check_type(PropertyType::FloatArray)?;
        self.check_writable()?;
        match &mut self.value {
            PropertyValue::FloatArray(v) => {
                if start > stop || stop > v.len() || values.len() != stop - start {
                    return Err(Error::Range);
                }
                v[start..stop].copy_from_slice(values);
                self.modified = true;
                Ok(())
            }
            _ => Err(Error::TypeMismatch),
        }
    }

    pub fn float_array_length(&self) -> Result<usize> {
        match &self.value {
            PropertyValue::FloatArray(v) => Ok(v.len()),
            _ => Err(Error::TypeMismatch),
        }
    }

    pub fn replace_int_array(&mut self, values: Vec<i32>) -> Result<()> {
        self.check_type(PropertyType::IntArray)?;
        self.check_writable()?;
        if values.len() < self.descriptor.min_length || values.len() > self.descriptor.max_length {
            return Err(Error::Range);
        }
        self.value = PropertyValue::IntArray(values);
        self.modified = true;
        Ok(())
    }

    pub fn read_int_array(&self, index: usize) -> Result<i32> {
        match &self.value {
            PropertyValue::IntArray(v) => v.get(index).copied().ok_or(Error::Range),
            _ => Err(Error::TypeMismatch),
        }
    }

    pub fn write_int_array(&mut self, start: usize, stop: usize, values: &[i32]) -> Result<()> {
        self.check_type(PropertyType::IntArray)?;
        self.check_writable()?;
        match &mut self.value {
            PropertyValue::IntArray(v) => {
                if start > stop || stop > v.len() || values.len() != stop - start {
                    return Err(Error::Range);
                }
                v[start..stop].copy_from_slice(values);
                self.modified = true;
                Ok(())
            }
            _ => Err(Error::TypeMismatch),
        }
    }

    pub fn int_array_length(&self) -> Result<usize> {
        match &self.value {
            PropertyValue::IntArray(v) => Ok(v.len()),
            _ => Err(Error::TypeMismatch),
        }
    }

    /// The legal length range for an array property, `TypeMismatch` for
    /// anything else.
    pub fn array_length_range(&self) -> Result<(usize, usize)> {
        match self.property_type() {
            PropertyType::FloatArray | PropertyType::IntArray => {
                Ok((self.descriptor.min_length, self.descriptor.max_length))
            }
            _ => Err(Error::TypeMismatch),
        }
    }

    /// Restore the default value and cancel any ramp.
    pub fn reset(&mut self) -> Result<()> {
        self.check_writable()?;
        self.value = self.descriptor.default.clone();
        self.ramp = None;
        self.modified = true;
        Ok(())
    }

    // --- Block evaluation ---

    /// Advance ramp state and prepare the per-sample buffer for this block.
    pub(crate) fn tick(&mut self, block_size: usize) {
        let modulated = self
            .modulation
            .as_ref()
            .map(|m| !m.incoming.is_empty())
            .unwrap_or(false);
        self.a_rate = modulated || self.ramp.is_some();
        if !self.a_rate {
            return;
        }

        if self.block_buffer.len() != block_size {
            self.block_buffer.resize(block_size, 0.0);
        }

        let mut scalar = match self.value {
            PropertyValue::Float(v) => v,
            // Only float properties carry ramps or modulation.
            _ => return,
        };

        let mut ramp_landed = false;
        if let Some(ramp) = &mut self.ramp {
            for sample in self.block_buffer.iter_mut() {
                if ramp.remaining > 0 {
                    scalar += ramp.increment;
                    ramp.remaining -= 1;
                    if ramp.remaining == 0 {
                        // Land exactly on the target; increments accumulate
                        // rounding error.
                        scalar = ramp.target;
                    }
                }
                *sample = scalar;
            }
            ramp_landed = ramp.remaining == 0;
            self.value = PropertyValue::Float(scalar);
        } else {
            self.block_buffer.fill(scalar);
        }
        if ramp_landed {
            self.ramp = None;
        }

        if modulated {
            if let Some(modulation) = &self.modulation {
                kernels::accumulate(&mut self.block_buffer, &modulation.buffer);
            }
        }
    }

    /// The k-rate scalar (floats only; other types return 0).
    pub fn float_value(&self) -> f32 {
        match self.value {
            PropertyValue::Float(v) => v,
            _ => 0.0,
        }
    }

    /// The per-sample value at `index` this block.
    pub fn float_at(&self, index: usize) -> f32 {
        if self.a_rate {
            self.block_buffer.get(index).copied().unwrap_or_else(|| self.float_value())
        } else {
            self.float_value()
        }
    }
}

/// Slot-indexed property map owned by a node.
///
/// Slots iterate in ascending order (`BTreeMap`), which keeps modulation
/// accumulation and ramp advancement deterministic across runs.
pub struct PropertyStore {
    properties: BTreeMap<u32, Property>,
    block_size: usize,
}

impl PropertyStore {
    pub(crate) fn new(block_size: usize) -> Self {
        Self {
            properties: BTreeMap::new(),
            block_size,
        }
    }

    pub(crate) fn insert(&mut self, slot: u32, descriptor: PropertyDescriptor) {
        self.properties
            .insert(slot, Property::new(descriptor, self.block_size));
    }

    pub fn get(&self, slot: u32) -> Option<&Property> {
        self.properties.get(&slot)
    }

    pub(crate) fn get_mut(&mut self, slot: u32) -> Option<&mut Property> {
        self.properties.get_mut(&slot)
    }

    pub fn contains(&self, slot: u32) -> bool {
        self.properties.contains_key(&slot)
    }

    // Infallible reads for `process()` bodies. A node kind knows its own
    // slots; a wrong slot reads as silence rather than a panic on the
    // audio path.

    /// The k-rate float value of `slot`, or 0.0.
    pub fn float(&self, slot: u32) -> f32 {
        self.get(slot).map(|p| p.float_value()).unwrap_or(0.0)
    }

    /// The per-sample float value of `slot` at `index`, or 0.0.
    pub fn float_at(&self, slot: u32, index: usize) -> f32 {
        self.get(slot).map(|p| p.float_at(index)).unwrap_or(0.0)
    }

    /// The int value of `slot`, or 0.
    pub fn int(&self, slot: u32) -> i32 {
        self.get(slot).and_then(|p| p.get_int().ok()).unwrap_or(0)
    }

    /// The double value of `slot`, or 0.0.
    pub fn double(&self, slot: u32) -> f64 {
        self.get(slot).and_then(|p| p.get_double().ok()).unwrap_or(0.0)
    }

    /// The shared buffer referenced by `slot`, if any.
    pub fn buffer(&self, slot: u32) -> Option<Arc<AudioBuffer>> {
        self.get(slot).and_then(|p| p.get_buffer().ok()).flatten()
    }

    /// Whether `slot` must be evaluated per-sample this block.
    pub fn needs_a_rate(&self, slot: u32) -> bool {
        self.get(slot).map(|p| p.needs_a_rate()).unwrap_or(false)
    }

    /// Whether `slot` was written since the previous block.
    pub fn was_modified(&self, slot: u32) -> bool {
        self.get(slot).map(|p| p.was_modified()).unwrap_or(false)
    }

    /// Whether any of `slots` was written since the previous block.
    pub fn any_modified(&self, slots: &[u32]) -> bool {
        slots.iter().any(|&s| self.was_modified(s))
    }

    pub(crate) fn tick_all(&mut self) {
        for property in self.properties.values_mut() {
            property.tick(self.block_size);
        }
    }

    pub(crate) fn clear_modified(&mut self) {
        for property in self.properties.values_mut() {
            property.modified = false;
        }
    }

    /// Slots that currently have modulation fan-in, in slot order.
    pub(crate) fn modulated_slots(&self) -> Vec<u32> {
        self.properties
            .iter()
            .filter(|(_, p)| {
                p.modulation
                    .as_ref()
                    .map(|m| !m.incoming.is_empty())
                    .unwrap_or(false)
            })
            .map(|(&slot, _)| slot)
            .collect()
    }

    pub(crate) fn modulation_edges(&self, slot: u32) -> Vec<EdgeId> {
        self.properties
            .get(&slot)
            .and_then(|p| p.modulation.as_ref())
            .map(|m| m.incoming.clone())
            .unwrap_or_default()
    }

    pub(crate) fn zero_modulation(&mut self, slot: u32) {
        if let Some(modulation) = self.properties.get_mut(&slot).and_then(|p| p.modulation.as_mut())
        {
            modulation.buffer.fill(0.0);
        }
    }

    pub(crate) fn accumulate_modulation(&mut self, slot: u32, source: &[f32]) {
        if let Some(modulation) = self.properties.get_mut(&slot).and_then(|p| p.modulation.as_mut())
        {
            kernels::accumulate(&mut modulation.buffer, source);
        }
    }

    /// Drop a detached edge from every modulation input that holds it.
    pub(crate) fn remove_modulation_edge(&mut self, edge: EdgeId) {
        for property in self.properties.values_mut() {
            if let Some(modulation) = property.modulation.as_mut() {
                modulation.incoming.retain(|&e| e != edge);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(slot: u32, descriptor: PropertyDescriptor) -> PropertyStore {
        let mut store = PropertyStore::new(64);
        store.insert(slot, descriptor);
        store
    }

    #[test]
    fn test_float_clamped_to_range() {
        let mut store = store_with(10, PropertyDescriptor::float("gain", 0.0, -1.0, 1.0));
        store.get_mut(10).unwrap().set_float(5.0).unwrap();
        assert_eq!(store.float(10), 1.0);
        store.get_mut(10).unwrap().set_float(-5.0).unwrap();
        assert_eq!(store.float(10), -1.0);
    }

    #[test]
    fn test_type_mismatch() {
        let store = store_with(10, PropertyDescriptor::float("gain", 0.0, -1.0, 1.0));
        assert_eq!(store.get(10).unwrap().get_int(), Err(Error::TypeMismatch));
        assert_eq!(
            store.get(10).unwrap().array_length_range(),
            Err(Error::TypeMismatch)
        );
    }

    #[test]
    fn test_read_only_rejects_writes() {
        let mut store = store_with(
            10,
            PropertyDescriptor::float("gain", 0.5, 0.0, 1.0).read_only(),
        );
        assert_eq!(
            store.get_mut(10).unwrap().set_float(0.1),
            Err(Error::PropertyReadOnly)
        );
        assert_eq!(store.float(10), 0.5);
    }

    #[test]
    fn test_k_rate_is_constant() {
        let mut store = store_with(10, PropertyDescriptor::float("gain", 0.25, 0.0, 1.0));
        store.tick_all();
        let property = store.get(10).unwrap();
        assert!(!property.needs_a_rate());
        for i in 0..64 {
            assert_eq!(property.float_at(i), 0.25);
        }
    }

    #[test]
    fn test_ramp_is_a_rate_and_lands() {
        let mut store = store_with(10, PropertyDescriptor::float("gain", 0.0, 0.0, 1.0));
        // 128 samples at sr=64: two blocks of 64.
        store
            .get_mut(10)
            .unwrap()
            .linear_ramp(1.0, 2.0, 64.0)
            .unwrap();

        store.tick_all();
        let property = store.get(10).unwrap();
        assert!(property.needs_a_rate());
        let mid = property.float_at(63);
        assert!((mid - 0.5).abs() < 0.01, "halfway point: {mid}");

        store.tick_all();
        let property = store.get(10).unwrap();
        assert_eq!(property.float_at(63), 1.0);

        // Landed: next block is k-rate at the target.
        store.tick_all();
        let property = store.get(10).unwrap();
        assert!(!property.needs_a_rate());
        assert_eq!(property.float_value(), 1.0);
    }

    #[test]
    fn test_write_cancels_ramp() {
        let mut store = store_with(10, PropertyDescriptor::float("gain", 0.0, 0.0, 1.0));
        store
            .get_mut(10)
            .unwrap()
            .linear_ramp(1.0, 1.0, 64.0)
            .unwrap();
        store.get_mut(10).unwrap().set_float(0.75).unwrap();
        store.tick_all();
        assert!(!store.needs_a_rate(10));
        assert_eq!(store.float(10), 0.75);
    }

    #[test]
    fn test_array_length_limits() {
        let mut store = store_with(
            10,
            PropertyDescriptor::float_array("delays", vec![0.0; 4], 2, 8),
        );
        assert_eq!(
            store.get_mut(10).unwrap().replace_float_array(vec![0.0; 1]),
            Err(Error::Range)
        );
        assert_eq!(
            store.get_mut(10).unwrap().replace_float_array(vec![0.0; 9]),
            Err(Error::Range)
        );
        store
            .get_mut(10)
            .unwrap()
            .replace_float_array(vec![1.0; 8])
            .unwrap();
        assert_eq!(store.get(10).unwrap().float_array_length(), Ok(8));
        assert_eq!(store.get(10).unwrap().array_length_range(), Ok((2, 8)));
    }

    #[test]
    fn test_array_window_write() {
        let mut store = store_with(
            10,
            PropertyDescriptor::float_array("delays", vec![0.0; 4], 0, 16),
        );
        store
            .get_mut(10)
            .unwrap()
            .write_float_array(1, 3, &[0.5, 0.6])
            .unwrap();
        assert_eq!(store.get(10).unwrap().read_float_array(0), Ok(0.0));
        assert_eq!(store.get(10).unwrap().read_float_array(1), Ok(0.5));
        assert_eq!(store.get(10).unwrap().read_float_array(2), Ok(0.6));
        assert_eq!(store.get(10).unwrap().read_float_array(4), Err(Error::Range));
        assert_eq!(
            store.get_mut(10).unwrap().write_float_array(3, 5, &[1.0, 1.0]),
            Err(Error::Range)
        );
    }

    #[test]
    fn test_modified_flags() {
        let mut store = store_with(10, PropertyDescriptor::float("gain", 0.0, 0.0, 1.0));
        assert!(!store.was_modified(10));
        store.get_mut(10).unwrap().set_float(0.5).unwrap();
        assert!(store.was_modified(10));
        assert!(store.any_modified(&[9, 10]));
        store.clear_modified();
        assert!(!store.was_modified(10));
    }

    #[test]
    fn test_reset_restores_default() {
        let mut store = store_with(10, PropertyDescriptor::float("gain", 0.25, 0.0, 1.0));
        store.get_mut(10).unwrap().set_float(0.9).unwrap();
        store.get_mut(10).unwrap().reset().unwrap();
        assert_eq!(store.float(10), 0.25);
    }

    #[test]
    fn test_int_enumeration_clamps() {
        let mut store = store_with(10, PropertyDescriptor::int("mode", 0, 0, 2));
        store.get_mut(10).unwrap().set_int(7).unwrap();
        assert_eq!(store.int(10), 2);
        store.get_mut(10).unwrap().set_int(-3).unwrap();
        assert_eq!(store.int(10), 0);
    }
}
