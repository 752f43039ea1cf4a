// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

pub mod auth;
pub mod stocks;
pub mod purchase;
pub mod portfolio;
pub mod companies;
pub mod applications;
pub mod requests;
pub mod dashboard;
pub mod doctor;
pub mod exporter;
