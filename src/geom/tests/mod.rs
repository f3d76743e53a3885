mod test_evaluators_basic;
