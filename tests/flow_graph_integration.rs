use flowgraph_ir::ir::intrinsics::{create_binary_arithmetic, operators};
use flowgraph_ir::{
    BlockFlow, BlockParameter, Branch, Constant, FlowGraph, FlowGraphBuilder, Instruction,
    IrConfig, IrType, MethodBody, Parameter, PassPipeline,
};

fn int32() -> IrType {
    IrType::int32()
}

/// `max(a, b)` as a three block graph.
fn max_graph() -> FlowGraph {
    let builder = FlowGraphBuilder::new();
    let entry = builder.entry_point();
    let a = entry.append_parameter(BlockParameter::new(int32(), "a"));
    let b = entry.append_parameter(BlockParameter::new(int32(), "b"));
    let a_is_less = entry.append_instruction(
        create_binary_arithmetic(operators::IS_LESS_THAN, int32(), a.clone(), b.clone()),
        "a_is_less",
    );

    let done = builder.add_basic_block("done");
    let result = done.append_parameter(BlockParameter::new(int32(), "result"));
    done.set_flow(BlockFlow::return_value(Instruction::create_copy(int32(), result)));

    entry.set_flow(BlockFlow::if_else(
        Instruction::create_copy(IrType::Bool, a_is_less.tag().clone()),
        Branch::with_values(done.tag().clone(), [b]),
        Branch::with_values(done.tag().clone(), [a]),
    ));
    builder.to_immutable()
}

fn body(graph: FlowGraph, parameter_count: usize) -> MethodBody {
    MethodBody::new(
        Parameter::new(int32(), "result"),
        None,
        (0..parameter_count)
            .map(|index| Parameter::new(int32(), &format!("p{index}")))
            .collect(),
        graph,
    )
}

#[test]
fn inlining_a_call_and_optimizing_the_result() {
    // entry: x = 3; y = 8; m = <call max>(x, y); return copy(m)
    let builder = FlowGraphBuilder::new();
    let entry = builder.entry_point();
    let x = entry
        .append_instruction(Instruction::create_constant(Constant::int32(3), int32()), "x")
        .tag()
        .clone();
    let y = entry
        .append_instruction(Instruction::create_constant(Constant::int32(8), int32()), "y")
        .tag()
        .clone();
    let call = entry.append_instruction(
        create_binary_arithmetic(operators::ADD, int32(), x.clone(), y.clone()),
        "m",
    );
    entry.set_flow(BlockFlow::return_value(Instruction::create_copy(
        int32(),
        call.tag().clone(),
    )));

    let callee = max_graph();
    call.replace_with_graph_and_arguments(&callee, &[x, y]);
    let inlined = builder.to_immutable();
    assert_eq!(inlined.block_count(), 1 + 1 + callee.block_count());
    assert!(body(inlined.clone(), 0).validate().is_empty());

    let config = IrConfig::from_toml_str(
        r#"
        [pipeline]
        verify_after_each_pass = true
        max_iterations = 8
        "#,
    )
    .expect("config parses");
    let pipeline = PassPipeline::from_config(&config.pipeline).expect("default passes exist");
    let optimized = pipeline
        .optimize(&body(inlined.clone(), 0))
        .expect("optimization keeps the body valid");
    let graph = optimized.implementation;

    // The comparison folds into a jump and only the returned constant survives
    assert!(
        graph
            .basic_blocks()
            .all(|block| !matches!(block.flow(), BlockFlow::Switch(_)))
    );
    assert_eq!(graph.instruction_count(), 1);
    let returned = graph
        .basic_blocks()
        .find_map(|block| match block.flow() {
            BlockFlow::Return(flow) => flow.return_value.as_copy_source().cloned(),
            _ => None,
        })
        .expect("some block still returns");
    let returned = graph.get_instruction(&returned);
    assert_eq!(returned.instruction().as_constant(), Some(&Constant::int32(8)));

    // The unoptimized graph is still intact
    assert!(body(inlined, 0).validate().is_empty());
}

#[test]
fn graphs_can_be_shared_across_threads() {
    let graph = max_graph();
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let graph = graph.clone();
            std::thread::spawn(move || {
                let edited = graph.add_basic_block("extra").into_graph();
                (graph.block_count(), edited.block_count())
            })
        })
        .collect();

    for handle in handles {
        let (before, after) = handle.join().expect("thread finished");
        assert_eq!((before, after), (2, 3));
    }
    assert!(body(graph, 2).validate().is_empty());
}
