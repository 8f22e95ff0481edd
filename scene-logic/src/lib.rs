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

//! A declarative scene-logic engine: a DAG of typed logic nodes - animations,
//! scene-object bindings, timers - wired together by links between their
//! input and output properties, and driven one tick at a time by [`Engine`].
//!
//! ```text
//! DataArray ---> AnimationState ---> property tree ---> link ---> binding ---> external scene object
//! ```
//!
//! [`Engine`] is the only type a host needs to hold onto; everything else is
//! reached through [`NodeId`]/[`PropertyRef`] handles it hands out.

pub mod animation;
pub mod bindings;
pub mod dag;
pub mod data_array;
pub mod dependencies;
pub mod engine;
pub mod error;
pub mod ids;
pub mod node;
pub mod property;
pub mod serialization;
pub mod type_data;

pub use animation::{AnimationChannel, AnimationState, Interpolation};
pub use bindings::{
    Clock, ExternalAppearance, ExternalCamera, ExternalMeshNode, ExternalRenderBuffer,
    ExternalRenderPass, ExternalSceneNode, SystemClock, UniformDescriptor,
};
pub use data_array::{DataArray, DataArrayContent};
pub use engine::Engine;
pub use error::{LogicError, LogicResult};
pub use ids::{DataArrayId, NodeId};
pub use node::{LogicNode, NodeKind};
pub use property::{PathSegment, PropertyPath, PropertyRef, PropertySemantics, PropertyValue};
pub use serialization::{
    ExternalObjectKind, LoadConfig, Resolver, SaveConfig, CURRENT_FEATURE_LEVEL,
};
pub use type_data::{HierarchicalTypeData, PrimitiveType, TypeData};

pub use scene_logic_core::pool::Handle;
