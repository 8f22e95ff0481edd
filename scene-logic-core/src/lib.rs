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

//! Shared foundation for the scene-logic engine: a generational arena, a
//! schema-evolvable binary serializer, a process-wide logger and the scalar
//! math the animation evaluator needs. Nothing in here knows about logic
//! nodes, properties or the dependency graph - that lives in the
//! `scene-logic` crate, which depends on this one as a leaf utility layer.

pub mod log;
pub mod math;
pub mod pool;
pub mod visitor;

pub use nalgebra as algebra;
