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

//! Stable identifiers. Unlike [`scene_logic_core::pool::Handle`], these
//! survive save/load - they're the engine-assigned `id` from `LogicNode` and
//! `DataArray`, and are what links, the DAG and the resolver address objects
//! by.

/// Unique (within one engine instance) id of a `LogicNode`. Also its stable
/// handle across save/load.
pub type NodeId = u64;

/// Unique (within one engine instance) id of a `DataArray`.
pub type DataArrayId = u64;
