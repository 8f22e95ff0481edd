// Copyright (c) 2024-present the scene-logic contributors.
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT.

//! Keyframe animation. An `AnimationNode` samples one or more channels at a
//! shared `progress` and writes one output per channel, plus a `duration`
//! derived from the longest channel.
//!
//! The per-channel interpolation dispatch is written against a flattened
//! "components" view of whatever element type a channel holds (scalar,
//! vector, or raw array-of-float) so `Step`/`Linear`/`Cubic` each have a
//! single implementation instead of one per element type.

use crate::data_array::{DataArray, DataArrayContent};
use crate::error::{LogicError, LogicResult};
use crate::ids::DataArrayId;
use crate::property::{
    build_property_tree, child_by_name, get_value, set_value, PropertyImpl, PropertySemantics,
};
use crate::type_data::{HierarchicalTypeData, PrimitiveType};
use fxhash::FxHashMap;
use nalgebra::{Vector2, Vector3, Vector4};
use scene_logic_core::math::{clamp_unit, cubic_hermite, lerpf};
use scene_logic_core::pool::{Handle, Pool};
use scene_logic_core::visitor::{Visit, VisitError, VisitResult, Visitor};

/// How a channel's keyframes are sampled between timestamps.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Interpolation {
    Step,
    Linear,
    Cubic,
    LinearQuaternions,
    CubicQuaternions,
}

impl Interpolation {
    fn is_cubic(self) -> bool {
        matches!(self, Interpolation::Cubic | Interpolation::CubicQuaternions)
    }

    fn is_quaternion(self) -> bool {
        matches!(
            self,
            Interpolation::LinearQuaternions | Interpolation::CubicQuaternions
        )
    }

    fn to_tag(self) -> u8 {
        match self {
            Interpolation::Step => 0,
            Interpolation::Linear => 1,
            Interpolation::Cubic => 2,
            Interpolation::LinearQuaternions => 3,
            Interpolation::CubicQuaternions => 4,
        }
    }

    fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            0 => Interpolation::Step,
            1 => Interpolation::Linear,
            2 => Interpolation::Cubic,
            3 => Interpolation::LinearQuaternions,
            4 => Interpolation::CubicQuaternions,
            _ => return None,
        })
    }
}

impl Default for Interpolation {
    fn default() -> Self {
        Interpolation::Step
    }
}

impl Visit for Interpolation {
    fn visit(&mut self, name: &str, visitor: &mut Visitor) -> VisitResult {
        let mut tag = self.to_tag();
        tag.visit(name, visitor)?;
        if visitor.is_reading() {
            *self = Interpolation::from_tag(tag).ok_or(VisitError::NotSupportedFormat)?;
        }
        Ok(())
    }
}

/// Immutable description of one channel: which `DataArray`s to sample and
/// how to interpolate between their entries.
#[derive(Clone, Debug, Default)]
pub struct AnimationChannel {
    pub name: String,
    pub timestamps_id: DataArrayId,
    pub keyframes_id: DataArrayId,
    pub interpolation: Interpolation,
    pub tangents_in_id: Option<DataArrayId>,
    pub tangents_out_id: Option<DataArrayId>,
}

impl Visit for AnimationChannel {
    fn visit(&mut self, name: &str, visitor: &mut Visitor) -> VisitResult {
        let mut region = visitor.enter_region(name)?;
        self.name.visit("Name", &mut region)?;
        self.timestamps_id.visit("TimestampsId", &mut region)?;
        self.keyframes_id.visit("KeyframesId", &mut region)?;
        self.interpolation.visit("Interpolation", &mut region)?;
        let mut tangents_in = self.tangents_in_id.unwrap_or(0);
        tangents_in.visit("TangentsInId", &mut region)?;
        let mut tangents_out = self.tangents_out_id.unwrap_or(0);
        tangents_out.visit("TangentsOutId", &mut region)?;
        if region.is_reading() {
            self.tangents_in_id = if tangents_in == 0 {
                None
            } else {
                Some(tangents_in)
            };
            self.tangents_out_id = if tangents_out == 0 {
                None
            } else {
                Some(tangents_out)
            };
        }
        Ok(())
    }
}

/// The mutable per-channel copy of (timestamps, keyframes) the node actually
/// samples from. Starts as a copy of the backing `DataArray`s and is
/// overwritten at runtime only when channel data is exposed as properties.
#[derive(Clone, Debug)]
pub struct ChannelWorking {
    pub timestamps: Vec<f32>,
    pub keyframes: DataArrayContent,
}

pub struct AnimationState {
    pub channels: Vec<AnimationChannel>,
    pub expose_data_as_properties: bool,
    pub working: Vec<ChannelWorking>,
    pub duration: f32,
}

fn lookup<'a>(
    data_arrays: &'a FxHashMap<DataArrayId, DataArray>,
    id: DataArrayId,
    owner: &str,
) -> LogicResult<&'a DataArray> {
    data_arrays.get(&id).ok_or_else(|| {
        LogicError::resource(format!(
            "animation node '{owner}' references a DataArray (id {id}) that does not belong to this engine"
        ))
    })
}

fn validate_channel(
    channel: &AnimationChannel,
    data_arrays: &FxHashMap<DataArrayId, DataArray>,
    owner: &str,
) -> LogicResult<()> {
    let timestamps = lookup(data_arrays, channel.timestamps_id, owner)?;
    let keyframes = lookup(data_arrays, channel.keyframes_id, owner)?;

    let ts = timestamps.content.as_float_slice().ok_or_else(|| {
        LogicError::illegal_argument(format!(
            "channel '{}' of '{owner}': timestamps DataArray must be Float",
            channel.name
        ))
    })?;
    if ts.is_empty() {
        return Err(LogicError::illegal_argument(format!(
            "channel '{}' of '{owner}': timestamps must have at least one element",
            channel.name
        )));
    }
    if ts.windows(2).any(|w| w[1] <= w[0]) || ts[0] < 0.0 {
        return Err(LogicError::illegal_argument(format!(
            "channel '{}' of '{owner}': timestamps must be strictly ascending and non-negative",
            channel.name
        )));
    }
    if keyframes.len() != ts.len() {
        return Err(LogicError::illegal_argument(format!(
            "channel '{}' of '{owner}': timestamps and keyframes must have the same length",
            channel.name
        )));
    }

    let wants_tangents = channel.interpolation.is_cubic();
    match (
        wants_tangents,
        channel.tangents_in_id,
        channel.tangents_out_id,
    ) {
        (true, Some(tin), Some(tout)) => {
            let tangents_in = lookup(data_arrays, tin, owner)?;
            let tangents_out = lookup(data_arrays, tout, owner)?;
            if tangents_in.len() != keyframes.len() || tangents_out.len() != keyframes.len() {
                return Err(LogicError::illegal_argument(format!(
                    "channel '{}' of '{owner}': tangents must have the same length as keyframes",
                    channel.name
                )));
            }
        }
        (true, _, _) => {
            return Err(LogicError::illegal_argument(format!(
                "channel '{}' of '{owner}': Cubic interpolation requires tangents_in and tangents_out",
                channel.name
            )));
        }
        (false, None, None) => {}
        (false, _, _) => {
            return Err(LogicError::illegal_argument(format!(
                "channel '{}' of '{owner}': only Cubic interpolation may carry tangents",
                channel.name
            )));
        }
    }

    if channel.interpolation.is_quaternion() && !matches!(keyframes.content, DataArrayContent::Vec4f(_)) {
        return Err(LogicError::illegal_argument(format!(
            "channel '{}' of '{owner}': quaternion interpolation requires Vec4f keyframes",
            channel.name
        )));
    }

    Ok(())
}

fn element_tag(content: &DataArrayContent) -> PrimitiveType {
    match content {
        DataArrayContent::Float(_) => PrimitiveType::Float,
        DataArrayContent::Int32(_) => PrimitiveType::Int32,
        DataArrayContent::Vec2f(_) => PrimitiveType::Vec2f,
        DataArrayContent::Vec3f(_) => PrimitiveType::Vec3f,
        DataArrayContent::Vec4f(_) => PrimitiveType::Vec4f,
        DataArrayContent::Vec2i(_) => PrimitiveType::Vec2i,
        DataArrayContent::Vec3i(_) => PrimitiveType::Vec3i,
        DataArrayContent::Vec4i(_) => PrimitiveType::Vec4i,
        DataArrayContent::ArrayOfFloat(_) => PrimitiveType::Array,
    }
}

impl AnimationState {
    /// Validates every channel, snapshots the referenced `DataArray`s into the
    /// mutable working copy, and derives the initial `duration`.
    pub fn new(
        channels: Vec<AnimationChannel>,
        expose_data_as_properties: bool,
        data_arrays: &FxHashMap<DataArrayId, DataArray>,
        owner: &str,
    ) -> LogicResult<Self> {
        if channels.is_empty() {
            return Err(LogicError::illegal_argument(format!(
                "animation node '{owner}' must have at least one channel"
            )));
        }
        for channel in &channels {
            validate_channel(channel, data_arrays, owner)?;
            if expose_data_as_properties
                && matches!(
                    lookup(data_arrays, channel.keyframes_id, owner)?.content,
                    DataArrayContent::ArrayOfFloat(_)
                )
            {
                return Err(LogicError::illegal_argument(format!(
                    "channel '{}' of '{owner}': Array-of-Float keyframes cannot be exposed as properties",
                    channel.name
                )));
            }
        }

        let working: Vec<ChannelWorking> = channels
            .iter()
            .map(|channel| {
                let timestamps = lookup(data_arrays, channel.timestamps_id, owner)
                    .unwrap()
                    .content
                    .as_float_slice()
                    .unwrap()
                    .to_vec();
                let keyframes = lookup(data_arrays, channel.keyframes_id, owner)
                    .unwrap()
                    .content
                    .clone();
                ChannelWorking {
                    timestamps,
                    keyframes,
                }
            })
            .collect();

        let duration = working
            .iter()
            .map(|w| *w.timestamps.last().expect("validated non-empty"))
            .fold(0.0_f32, f32::max);

        Ok(Self {
            channels,
            expose_data_as_properties,
            working,
            duration,
        })
    }

    /// Builds the `{progress[, channelsData], }` input shape.
    pub fn input_shape(&self) -> HierarchicalTypeData {
        let mut fields = vec![HierarchicalTypeData::make_primitive(
            "progress",
            PrimitiveType::Float,
        )];
        if self.expose_data_as_properties {
            let per_channel: Vec<HierarchicalTypeData> = self
                .channels
                .iter()
                .zip(&self.working)
                .map(|(channel, working)| {
                    HierarchicalTypeData::make_struct_of(
                        channel.name.clone(),
                        vec![
                            HierarchicalTypeData::make_array(
                                "timestamps",
                                working.timestamps.len(),
                                PrimitiveType::Float,
                            ),
                            HierarchicalTypeData::make_array(
                                "keyframes",
                                working.keyframes.len(),
                                element_tag(&working.keyframes),
                            ),
                        ],
                    )
                })
                .collect();
            fields.push(HierarchicalTypeData::make_struct_of(
                "channelsData",
                per_channel,
            ));
        }
        HierarchicalTypeData::make_struct_of("Inputs", fields)
    }

    /// Builds the `{duration, <channel outputs>}` output shape.
    pub fn output_shape(&self) -> HierarchicalTypeData {
        let mut fields = vec![HierarchicalTypeData::make_primitive(
            "duration",
            PrimitiveType::Float,
        )];
        for (channel, working) in self.channels.iter().zip(&self.working) {
            let shape = match &working.keyframes {
                DataArrayContent::ArrayOfFloat(values) => HierarchicalTypeData::make_array(
                    channel.name.clone(),
                    values.first().map(Vec::len).unwrap_or(0),
                    PrimitiveType::Float,
                ),
                other => HierarchicalTypeData::make_primitive(channel.name.clone(), element_tag(other)),
            };
            fields.push(shape);
        }
        HierarchicalTypeData::make_struct_of("Outputs", fields)
    }
}

fn components_at(content: &DataArrayContent, index: usize) -> Vec<f32> {
    match content {
        DataArrayContent::Float(v) => vec![v[index]],
        DataArrayContent::Int32(v) => vec![v[index] as f32],
        DataArrayContent::Vec2f(v) => vec![v[index].x, v[index].y],
        DataArrayContent::Vec3f(v) => vec![v[index].x, v[index].y, v[index].z],
        DataArrayContent::Vec4f(v) => vec![v[index].x, v[index].y, v[index].z, v[index].w],
        DataArrayContent::Vec2i(v) => vec![v[index].x as f32, v[index].y as f32],
        DataArrayContent::Vec3i(v) => vec![v[index].x as f32, v[index].y as f32, v[index].z as f32],
        DataArrayContent::Vec4i(v) => vec![
            v[index].x as f32,
            v[index].y as f32,
            v[index].z as f32,
            v[index].w as f32,
        ],
        DataArrayContent::ArrayOfFloat(v) => v[index].clone(),
    }
}

/// Writes `components` into the output leaf(s) for one channel: a single
/// property for scalar/vector element types, or one property per element for
/// Array-of-Float.
fn write_output(
    pool: &mut Pool<PropertyImpl>,
    output_handle: Handle<PropertyImpl>,
    keyframes: &DataArrayContent,
    components: &[f32],
) -> LogicResult<()> {
    match keyframes {
        DataArrayContent::Float(_) => set_value(pool, output_handle, components[0]),
        DataArrayContent::Int32(_) => set_value(pool, output_handle, components[0].round() as i32),
        DataArrayContent::Vec2f(_) => {
            set_value(pool, output_handle, Vector2::new(components[0], components[1]))
        }
        DataArrayContent::Vec3f(_) => set_value(
            pool,
            output_handle,
            Vector3::new(components[0], components[1], components[2]),
        ),
        DataArrayContent::Vec4f(_) => set_value(
            pool,
            output_handle,
            Vector4::new(components[0], components[1], components[2], components[3]),
        ),
        DataArrayContent::Vec2i(_) => set_value(
            pool,
            output_handle,
            Vector2::new(components[0].round() as i32, components[1].round() as i32),
        ),
        DataArrayContent::Vec3i(_) => set_value(
            pool,
            output_handle,
            Vector3::new(
                components[0].round() as i32,
                components[1].round() as i32,
                components[2].round() as i32,
            ),
        ),
        DataArrayContent::Vec4i(_) => set_value(
            pool,
            output_handle,
            Vector4::new(
                components[0].round() as i32,
                components[1].round() as i32,
                components[2].round() as i32,
                components[3].round() as i32,
            ),
        ),
        DataArrayContent::ArrayOfFloat(_) => {
            let children = pool.borrow(output_handle).children.clone();
            for (i, &child) in children.iter().enumerate() {
                set_value(pool, child, components[i])?;
            }
            Ok(())
        }
    }
}

fn tangent_components(
    tangents: Option<&DataArrayContent>,
    index: usize,
    width: usize,
) -> Vec<f32> {
    match tangents {
        Some(content) => components_at(content, index),
        None => vec![0.0; width],
    }
}

/// Samples one channel at local time `t` and returns its raw component
/// vector (before quaternion normalization, if applicable).
fn sample_channel(
    working: &ChannelWorking,
    channel: &AnimationChannel,
    tangents_in: Option<&DataArrayContent>,
    tangents_out: Option<&DataArrayContent>,
    t: f32,
) -> Vec<f32> {
    let n = working.timestamps.len();
    let ub = working.timestamps.partition_point(|&ts| ts <= t);
    let upper = ub.min(n - 1);
    let lower = if ub == 0 { 0 } else { (ub - 1).min(n - 1) };

    let ratio = if upper != lower {
        let dt = working.timestamps[upper] - working.timestamps[lower];
        clamp_unit((t - working.timestamps[lower]) / dt)
    } else {
        0.0
    };

    let p0 = components_at(&working.keyframes, lower);
    let width = p0.len();

    match channel.interpolation {
        Interpolation::Step => p0,
        Interpolation::Linear | Interpolation::LinearQuaternions => {
            let p1 = components_at(&working.keyframes, upper);
            p0.iter()
                .zip(&p1)
                .map(|(&a, &b)| lerpf(a, b, ratio))
                .collect()
        }
        Interpolation::Cubic | Interpolation::CubicQuaternions => {
            let p1 = components_at(&working.keyframes, upper);
            let dt = if upper != lower {
                working.timestamps[upper] - working.timestamps[lower]
            } else {
                0.0
            };
            let tan_out = tangent_components(tangents_out, lower, width);
            let tan_in = tangent_components(tangents_in, upper, width);
            (0..width)
                .map(|i| {
                    let m0 = dt * tan_out[i];
                    let m1 = dt * tan_in[i];
                    cubic_hermite(p0[i], p1[i], m0, m1, ratio)
                })
                .collect()
        }
    }
}

fn normalize_quaternion_components(mut components: Vec<f32>) -> Vec<f32> {
    let norm = (components.iter().map(|c| c * c).sum::<f32>()).sqrt();
    if norm > f32::EPSILON {
        for c in &mut components {
            *c /= norm;
        }
    }
    components
}

/// Reads back channel timestamps/keyframes from the exposed `channelsData`
/// properties, overwriting the working copy.
fn refresh_working_from_properties(
    pool: &Pool<PropertyImpl>,
    channels_data_root: Handle<PropertyImpl>,
    channels: &[AnimationChannel],
    working: &mut [ChannelWorking],
) -> LogicResult<()> {
    for (channel, working) in channels.iter().zip(working.iter_mut()) {
        let channel_struct = child_by_name(pool, channels_data_root, &channel.name)
            .expect("channel struct must exist when exposed as properties");
        let timestamps_root = child_by_name(pool, channel_struct, "timestamps").unwrap();
        let keyframes_root = child_by_name(pool, channel_struct, "keyframes").unwrap();

        let timestamp_children = pool.borrow(timestamps_root).children.clone();
        let mut timestamps = Vec::with_capacity(timestamp_children.len());
        for child in timestamp_children {
            timestamps.push(get_value::<f32>(pool, child)?);
        }

        let keyframe_children = pool.borrow(keyframes_root).children.clone();
        let keyframes = read_keyframes(pool, &keyframe_children, &working.keyframes)?;

        working.timestamps = timestamps;
        working.keyframes = keyframes;
    }
    Ok(())
}

fn read_keyframes(
    pool: &Pool<PropertyImpl>,
    children: &[Handle<PropertyImpl>],
    shape_like: &DataArrayContent,
) -> LogicResult<DataArrayContent> {
    Ok(match shape_like {
        DataArrayContent::Float(_) => DataArrayContent::Float(
            children.iter().map(|&h| get_value::<f32>(pool, h)).collect::<LogicResult<_>>()?,
        ),
        DataArrayContent::Int32(_) => DataArrayContent::Int32(
            children.iter().map(|&h| get_value::<i32>(pool, h)).collect::<LogicResult<_>>()?,
        ),
        DataArrayContent::Vec2f(_) => DataArrayContent::Vec2f(
            children.iter().map(|&h| get_value::<Vector2<f32>>(pool, h)).collect::<LogicResult<_>>()?,
        ),
        DataArrayContent::Vec3f(_) => DataArrayContent::Vec3f(
            children.iter().map(|&h| get_value::<Vector3<f32>>(pool, h)).collect::<LogicResult<_>>()?,
        ),
        DataArrayContent::Vec4f(_) => DataArrayContent::Vec4f(
            children.iter().map(|&h| get_value::<Vector4<f32>>(pool, h)).collect::<LogicResult<_>>()?,
        ),
        DataArrayContent::Vec2i(_) => DataArrayContent::Vec2i(
            children.iter().map(|&h| get_value::<Vector2<i32>>(pool, h)).collect::<LogicResult<_>>()?,
        ),
        DataArrayContent::Vec3i(_) => DataArrayContent::Vec3i(
            children.iter().map(|&h| get_value::<Vector3<i32>>(pool, h)).collect::<LogicResult<_>>()?,
        ),
        DataArrayContent::Vec4i(_) => DataArrayContent::Vec4i(
            children.iter().map(|&h| get_value::<Vector4<i32>>(pool, h)).collect::<LogicResult<_>>()?,
        ),
        DataArrayContent::ArrayOfFloat(_) => {
            unreachable!("Array-of-Float keyframes cannot be exposed as properties")
        }
    })
}

/// The per-tick update algorithm described in the animation node's contract:
/// refresh working data, locate the sampling segment for each channel,
/// interpolate, and write outputs.
pub fn update(
    state: &mut AnimationState,
    pool: &mut Pool<PropertyImpl>,
    inputs: Handle<PropertyImpl>,
    outputs: Handle<PropertyImpl>,
    data_arrays: &FxHashMap<DataArrayId, DataArray>,
) -> LogicResult<()> {
    if state.expose_data_as_properties {
        let channels_data_root = child_by_name(pool, inputs, "channelsData")
            .expect("expose_data_as_properties implies a channelsData input");
        refresh_working_from_properties(
            pool,
            channels_data_root,
            &state.channels,
            &mut state.working,
        )?;
        state.duration = state
            .working
            .iter()
            .map(|w| *w.timestamps.last().expect("channel has at least one key"))
            .fold(0.0_f32, f32::max);
    }

    let progress_handle = child_by_name(pool, inputs, "progress").expect("progress always exists");
    let progress = get_value::<f32>(pool, progress_handle)?;
    let local_time = progress * state.duration;

    let duration_handle = child_by_name(pool, outputs, "duration").expect("duration always exists");
    set_value(pool, duration_handle, state.duration)?;

    for (channel, working) in state.channels.clone().iter().zip(state.working.clone().iter()) {
        // Tangents are never exposed as properties (only keyframes/timestamps
        // are, per the channel-data property shape), so they always come
        // straight from the backing DataArrays.
        let tangents_in = channel
            .tangents_in_id
            .and_then(|id| data_arrays.get(&id))
            .map(|d| &d.content);
        let tangents_out = channel
            .tangents_out_id
            .and_then(|id| data_arrays.get(&id))
            .map(|d| &d.content);
        let mut components = sample_channel(working, channel, tangents_in, tangents_out, local_time);
        if channel.interpolation.is_quaternion() {
            components = normalize_quaternion_components(components);
        }
        let output_handle =
            child_by_name(pool, outputs, &channel.name).expect("channel output always exists");
        write_output(pool, output_handle, &working.keyframes, &components)?;
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::property::{build_property_tree, PropertyValue};

    fn engine_with_channel(
        timestamps: Vec<f32>,
        keyframes: DataArrayContent,
        interpolation: Interpolation,
        tangents: Option<(DataArrayContent, DataArrayContent)>,
    ) -> (AnimationState, FxHashMap<DataArrayId, DataArray>) {
        let mut data_arrays = FxHashMap::default();
        data_arrays.insert(1, DataArray::new(1, "ts", DataArrayContent::Float(timestamps)));
        data_arrays.insert(2, DataArray::new(2, "kf", keyframes));
        let (tin_id, tout_id) = if let Some((tin, tout)) = tangents {
            data_arrays.insert(3, DataArray::new(3, "tin", tin));
            data_arrays.insert(4, DataArray::new(4, "tout", tout));
            (Some(3), Some(4))
        } else {
            (None, None)
        };
        let channel = AnimationChannel {
            name: "value".to_string(),
            timestamps_id: 1,
            keyframes_id: 2,
            interpolation,
            tangents_in_id: tin_id,
            tangents_out_id: tout_id,
        };
        let state = AnimationState::new(vec![channel], false, &data_arrays, "anim").unwrap();
        (state, data_arrays)
    }

    fn run(
        state: &mut AnimationState,
        data_arrays: &FxHashMap<DataArrayId, DataArray>,
        progress: f32,
    ) -> PropertyValue {
        let mut pool = Pool::new();
        let inputs = build_property_tree(&mut pool, &state.input_shape(), PropertySemantics::AnimationInput);
        let outputs =
            build_property_tree(&mut pool, &state.output_shape(), PropertySemantics::AnimationOutput);
        set_value(&mut pool, child_by_name(&pool, inputs, "progress").unwrap(), progress).unwrap();
        update(state, &mut pool, inputs, outputs, data_arrays).unwrap();
        let output_handle = child_by_name(&pool, outputs, "value").unwrap();
        pool.borrow(output_handle).value.clone()
    }

    #[test]
    fn s1_linear_float_channel() {
        let (mut state, data_arrays) = engine_with_channel(
            vec![0.0, 1.0],
            DataArrayContent::Float(vec![10.0, 20.0]),
            Interpolation::Linear,
            None,
        );
        let expectations = [
            (0.0, 10.0),
            (0.5, 15.0),
            (1.0, 20.0),
            (-999.0, 10.0),
            (999.0, 20.0),
        ];
        for (progress, expected) in expectations {
            match run(&mut state, &data_arrays, progress) {
                PropertyValue::Float(v) => assert!((v - expected).abs() < 1e-5, "progress {progress} -> {v}, expected {expected}"),
                other => panic!("unexpected value {other:?}"),
            }
        }
    }

    #[test]
    fn s3_cubic_zero_tangents_collapses_to_smoothstep() {
        let (mut state, data_arrays) = engine_with_channel(
            vec![0.0, 1.0],
            DataArrayContent::Float(vec![0.0, 1.0]),
            Interpolation::Cubic,
            Some((
                DataArrayContent::Float(vec![0.0, 0.0]),
                DataArrayContent::Float(vec![0.0, 0.0]),
            )),
        );
        match run(&mut state, &data_arrays, 0.5) {
            PropertyValue::Float(v) => assert!((v - 0.5).abs() < 1e-5),
            other => panic!("unexpected value {other:?}"),
        }
    }

    #[test]
    fn cubic_with_nonzero_tangents_deviates_from_linear_midpoint() {
        // Same endpoints as s3, but non-zero tangents: the midpoint must move
        // away from the zero-tangent smoothstep result of 0.5, proving
        // tangents are actually read from the backing DataArrays rather than
        // always treated as zero.
        let (mut state, data_arrays) = engine_with_channel(
            vec![0.0, 1.0],
            DataArrayContent::Float(vec![0.0, 1.0]),
            Interpolation::Cubic,
            Some((
                DataArrayContent::Float(vec![0.0, 0.0]),
                DataArrayContent::Float(vec![6.0, 0.0]),
            )),
        );
        match run(&mut state, &data_arrays, 0.5) {
            PropertyValue::Float(v) => assert!((v - 0.5).abs() > 0.1, "expected deviation from 0.5, got {v}"),
            other => panic!("unexpected value {other:?}"),
        }
    }

    #[test]
    fn s4_linear_quaternion_is_normalized() {
        let (mut state, data_arrays) = engine_with_channel(
            vec![0.0, 1.0, 2.0],
            DataArrayContent::Vec4f(vec![
                Vector4::new(2.0, 0.0, 0.0, 0.0),
                Vector4::new(0.0, 2.0, 0.0, 0.0),
                Vector4::new(0.0, 0.0, 2.0, 0.0),
            ]),
            Interpolation::LinearQuaternions,
            None,
        );
        match run(&mut state, &data_arrays, 0.25) {
            PropertyValue::Vec4f(v) => {
                let expected = std::f32::consts::FRAC_1_SQRT_2;
                assert!((v.x - expected).abs() < 1e-6);
                assert!((v.y - expected).abs() < 1e-6);
                assert!(v.z.abs() < 1e-6);
                assert!(v.w.abs() < 1e-6);
            }
            other => panic!("unexpected value {other:?}"),
        }
    }

    #[test]
    fn s2_step_integer_vector_channel() {
        let (mut state, data_arrays) = engine_with_channel(
            vec![0.0, 1.0],
            DataArrayContent::Vec2i(vec![Vector2::new(0, 10), Vector2::new(1, 20)]),
            Interpolation::Step,
            None,
        );
        let expectations = [
            (0.0, Vector2::new(0, 10)),
            (0.99, Vector2::new(0, 10)),
            (1.000001, Vector2::new(1, 20)),
            (100.0, Vector2::new(1, 20)),
        ];
        for (progress, expected) in expectations {
            match run(&mut state, &data_arrays, progress) {
                PropertyValue::Vec2i(v) => assert_eq!(v, expected, "progress {progress}"),
                other => panic!("unexpected value {other:?}"),
            }
        }
    }
}
