// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.


mod api_test;
mod batch_orchestrator_test;
mod dispatch_test;
mod scheduler_test;
